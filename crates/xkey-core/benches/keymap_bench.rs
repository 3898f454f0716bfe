//! Criterion benchmarks for keymap lookups.
//!
//! Measures the per-character cost of finding a usable keycode, the keycode →
//! key lookup done for every captured key press, and the modifier mask table
//! rebuild done on every keymap change.
//!
//! Run with:
//! ```bash
//! cargo bench --package xkey-core --bench keymap_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use xkey_core::keymap::keysym::char_to_keysym;
use xkey_core::{KeyboardMapping, ModifierMapping, ModifierMaskTable};

// ── Fixture ───────────────────────────────────────────────────────────────────

const MIN_KEYCODE: u8 = 8;
const LEVELS: u8 = 7;

/// A 248-keycode, 7-level keymap with letters and digits on the first rows
/// and modifiers where a typical PC layout puts them.
fn pc_mapping() -> KeyboardMapping {
    let count = 248usize;
    let mut m = KeyboardMapping::new(MIN_KEYCODE, LEVELS, vec![0; count * usize::from(LEVELS)]);
    for (i, c) in ('a'..='z').enumerate() {
        let upper = c.to_ascii_uppercase();
        m.set_keysyms(24 + i as u8, &[c as u32, upper as u32, c as u32, upper as u32]);
    }
    for (i, c) in ('0'..='9').enumerate() {
        m.set_keysyms(10 + i as u8, &[c as u32]);
    }
    m.set_keysyms(50, &[0xFFE1]);
    m.set_keysyms(37, &[0xFFE3]);
    m.set_keysyms(64, &[0xFFE9]);
    m.set_keysyms(66, &[0xFFE5]);
    m.set_keysyms(77, &[0xFF7F]);
    m.set_keysyms(133, &[0xFFEB]);
    m
}

fn pc_modifiers() -> ModifierMapping {
    ModifierMapping::from_rows([&[50], &[66], &[37], &[64], &[77], &[], &[133], &[]])
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_usable_keycode_for(c: &mut Criterion) {
    let mapping = pc_mapping();
    let mut group = c.benchmark_group("keymap_lookup");

    for ch in ['a', 'Z', '9', 'é'] {
        group.bench_with_input(BenchmarkId::new("usable_keycode_for", ch), &ch, |b, &ch| {
            b.iter(|| mapping.usable_keycode_for(black_box(char_to_keysym(ch))))
        });
    }

    group.finish();
}

fn bench_lookup_key(c: &mut Criterion) {
    let mapping = pc_mapping();
    let mut group = c.benchmark_group("keymap_lookup");

    group.bench_function("lookup_key_letter", |b| {
        b.iter(|| mapping.lookup_key(black_box(38), false, false, false))
    });
    group.bench_function("lookup_key_modifier", |b| {
        b.iter(|| mapping.lookup_key(black_box(50), false, false, false))
    });

    group.finish();
}

fn bench_mask_table_build(c: &mut Criterion) {
    let mapping = pc_mapping();
    let modifiers = pc_modifiers();

    c.bench_function("modifier_mask_table_build", |b| {
        b.iter(|| ModifierMaskTable::build(black_box(&mapping), black_box(&modifiers)))
    });
}

criterion_group!(
    benches,
    bench_usable_keycode_for,
    bench_lookup_key,
    bench_mask_table_build,
);
criterion_main!(benches);
