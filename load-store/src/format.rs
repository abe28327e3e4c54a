//! Human-readable file sizes.

const BYTES_PER_KB: u64 = 1_000;
const BYTES_PER_MB: u64 = 1_000_000;

/// Render a byte count in kilobytes or megabytes, decimal base.
///
/// Zero is `"Zero KB"`. Anything below a megabyte is whole kilobytes, never
/// less than 1 for a non-empty file. Megabytes carry one decimal place, which
/// is dropped when it is zero.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "Zero KB".to_string();
    }

    if bytes < BYTES_PER_MB {
        let kb = ((bytes + BYTES_PER_KB / 2) / BYTES_PER_KB).max(1);
        return format!("{} KB", group_thousands(kb));
    }

    let tenths = bytes.saturating_add(BYTES_PER_MB / 20) / (BYTES_PER_MB / 10);
    let (whole, fraction) = (tenths / 10, tenths % 10);
    if fraction == 0 {
        format!("{} MB", group_thousands(whole))
    } else {
        format!("{}.{} MB", group_thousands(whole), fraction)
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
