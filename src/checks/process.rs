//! Process check: healthy iff at least one running process matches the name.
//!
//! Scans `/proc` directly instead of shelling out to `pgrep`. A process
//! matches when its `comm` equals the configured name (kernel truncates
//! comm to 15 bytes, so a long name also matches on that prefix) or its
//! cmdline contains the name as a token.

use super::CheckOutcome;

/// `comm` is truncated by the kernel to this many bytes.
const COMM_MAX: usize = 15;

pub fn probe(name: &str) -> CheckOutcome {
    match count_matching(name) {
        Ok(0) => CheckOutcome::unhealthy(format!("no running process matches '{name}'")),
        Ok(n) => CheckOutcome::healthy(format!("{n} matching process(es)")),
        Err(e) => CheckOutcome::unhealthy(format!("process scan failed: {e}")),
    }
}

fn count_matching(name: &str) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir("/proc")? {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let file_name = entry.file_name();
        let Some(pid_str) = file_name.to_str() else {
            continue;
        };
        if !pid_str.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if matches(&entry.path(), name) {
            count += 1;
        }
    }
    Ok(count)
}

/// Process entries can vanish mid-scan; any read error counts as no match.
fn matches(proc_dir: &std::path::Path, name: &str) -> bool {
    if let Ok(comm) = std::fs::read_to_string(proc_dir.join("comm")) {
        let comm = comm.trim_end();
        if comm == name {
            return true;
        }
        // Byte comparison: COMM_MAX may fall inside a multi-byte character
        // of the configured name.
        if name.len() > COMM_MAX && comm.as_bytes() == &name.as_bytes()[..COMM_MAX] {
            return true;
        }
    }
    if let Ok(raw) = std::fs::read(proc_dir.join("cmdline")) {
        return raw
            .split(|&b| b == 0)
            .filter_map(|arg| std::str::from_utf8(arg).ok())
            .any(|arg| {
                arg == name
                    || std::path::Path::new(arg)
                        .file_name()
                        .is_some_and(|f| f == name)
            });
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_test_process_is_found() {
        // The test harness runs as some process; its own comm is readable.
        let comm = std::fs::read_to_string("/proc/self/comm").unwrap();
        let outcome = probe(comm.trim_end());
        assert!(outcome.healthy, "detail: {}", outcome.detail);
    }

    #[test]
    fn multibyte_name_longer_than_comm_max_does_not_panic() {
        // 9 x 'é' is 18 bytes; byte 15 is mid-character.
        let outcome = probe("ééééééééé");
        assert!(!outcome.healthy);
    }

    #[test]
    fn nonexistent_process_is_unhealthy() {
        let outcome = probe("definitely-not-a-real-process-name-xyz");
        assert!(!outcome.healthy);
        assert!(outcome.detail.contains("no running process"));
    }
}
