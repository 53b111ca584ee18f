//! Digest of a written flag state.

use sha2::{Digest, Sha256};

use crate::models::{StageFlags, StudentId};

/// SHA-256 over one canonical line per student, lines sorted. The same set
/// of rows always yields the same digest regardless of input order.
pub fn state_digest<'a>(rows: impl IntoIterator<Item = (StudentId, &'a StageFlags)>) -> String {
    let mut lines: Vec<String> = rows
        .into_iter()
        .map(|(id, s)| {
            format!(
                "{id}|{}|{}|{}|{}",
                u8::from(s.exam_done),
                u8::from(s.needs_glasses),
                u8::from(s.other_pathology),
                u8::from(s.delivered)
            )
        })
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_ignores_order() {
        let a = StageFlags {
            exam_done: true,
            ..StageFlags::default()
        };
        let b = StageFlags::default();
        assert_eq!(
            state_digest([(1, &a), (2, &b)]),
            state_digest([(2, &b), (1, &a)])
        );
    }

    #[test]
    fn test_digest_sees_stage_changes() {
        let a = StageFlags::default();
        let b = StageFlags {
            delivered: true,
            ..StageFlags::default()
        };
        assert_ne!(state_digest([(1, &a)]), state_digest([(1, &b)]));
        assert_eq!(state_digest([(1, &a)]).len(), 64);
    }
}
