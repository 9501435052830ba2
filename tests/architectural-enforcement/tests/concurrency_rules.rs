//! Scans the core crate's sources for constructs that break the
//! host-loop/worker model.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use architectural_enforcement::core_src_dir;

/// Lines that are comments or inside `#[cfg(test)]` modules are exempt.
fn violations(pattern: &str) -> Vec<String> {
    let root = core_src_dir();
    assert!(root.exists(), "core src dir not found at {}", root.display());

    let mut found = Vec::new();
    for entry in WalkDir::new(&root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
    {
        scan_file(entry.path(), pattern, &mut found);
    }
    found
}

fn scan_file(path: &Path, pattern: &str, found: &mut Vec<String>) {
    let Ok(text) = fs::read_to_string(path) else {
        return;
    };

    let mut in_tests = false;
    for (number, line) in text.lines().enumerate() {
        if line.contains("#[cfg(test)]") {
            // Test modules sit at the end of their files.
            in_tests = true;
        }
        let trimmed = line.trim_start();
        if in_tests || trimmed.starts_with("//") {
            continue;
        }
        if line.contains(pattern) {
            found.push(format!("{}:{}: {}", path.display(), number + 1, line.trim()));
        }
    }
}

#[test]
fn no_blocking_sleep_in_library_code() {
    let found = violations("std::thread::sleep");
    assert!(
        found.is_empty(),
        "blocking sleeps in library code:\n{}",
        found.join("\n")
    );
}

#[test]
fn no_nested_runtimes_in_library_code() {
    let found = violations("block_on");
    assert!(
        found.is_empty(),
        "nested runtime entries in library code:\n{}",
        found.join("\n")
    );
}

#[test]
fn no_unwrap_on_locks_in_library_code() {
    let found = violations(".lock().unwrap()");
    assert!(
        found.is_empty(),
        "poisoned-lock panics in library code:\n{}",
        found.join("\n")
    );
}
