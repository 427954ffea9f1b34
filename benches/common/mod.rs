//! Common utilities for benchmarks.
//!
//! Provides test data generators with fixed seeds for reproducibility.

#![allow(dead_code)]

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use skip_review::diff::FileChange;

/// Fixed seed for reproducible benchmark data
const SEED: u64 = 42;

/// Create a seeded RNG for reproducible test data
pub fn seeded_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(SEED)
}

/// Generate a realistic patch with the specified number of lines.
///
/// Roughly 20% added, 20% removed, the rest context, with a hunk header
/// every 50 lines.
pub fn generate_patch(rng: &mut ChaCha8Rng, line_count: usize) -> String {
    let mut lines = Vec::with_capacity(line_count);
    let mut current_line = 1u32;

    lines.push(format!("@@ -1,{} +1,{} @@", line_count / 2, line_count / 2));

    for i in 1..line_count {
        if i % 50 == 0 {
            current_line += 50;
            lines.push(format!("@@ -{current_line},30 +{current_line},30 @@"));
            continue;
        }

        let content = generate_code_line(rng, i);
        match rng.random_range(0..10u8) {
            0..=1 => lines.push(format!("+{content}")),
            2..=3 => lines.push(format!("-{content}")),
            _ => lines.push(format!(" {content}")),
        }
    }

    lines.join("\n")
}

fn generate_code_line(rng: &mut ChaCha8Rng, line_num: usize) -> String {
    let templates = [
        "  const value = items.map((x) => x * 2);",
        "  if (!user) { return null; }",
        "  // Calculate the total before rendering",
        "  import { useState } from 'react';",
        "  color: #333;",
        "  t('checkout.button.submit')",
        "  }",
        "  return <Button className=\"primary\">{label}</Button>;",
        "  export function formatPrice(amount, currency) {",
        "  \"lodash\": \"^4.17.21\",",
    ];

    let idx = rng.random_range(0..templates.len());
    format!("{} // {}", templates[idx], line_num)
}

/// Generate `file_count` modified files with `lines_per_file` patch lines each.
pub fn generate_files(file_count: usize, lines_per_file: usize) -> Vec<FileChange> {
    let mut rng = seeded_rng();
    let extensions = ["ts", "tsx", "css", "md", "json"];
    (0..file_count)
        .map(|i| {
            let ext = extensions[rng.random_range(0..extensions.len())];
            let patch = generate_patch(&mut rng, lines_per_file);
            FileChange::from_patch(format!("src/module_{i}/file_{i}.{ext}"), patch)
        })
        .collect()
}

/// Render files as `git diff` output.
pub fn generate_unified_diff(files: &[FileChange]) -> String {
    files
        .iter()
        .map(|f| {
            format!(
                "diff --git a/{path} b/{path}\nindex 1111111..2222222 100644\n--- a/{path}\n+++ b/{path}\n{patch}\n",
                path = f.path,
                patch = f.patch.as_deref().unwrap_or(""),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_generate_patch_length() {
        let patch = super::generate_patch(&mut super::seeded_rng(), 100);
        assert_eq!(patch.lines().count(), 100);
    }

    #[test]
    fn test_generate_files_reproducible() {
        let a = super::generate_files(5, 40);
        let b = super::generate_files(5, 40);
        assert_eq!(a, b);
    }
}
