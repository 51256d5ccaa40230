// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Formats and prints report summaries to the console.

use comfy_table::{Attribute, Cell, Table};

use super::Report;

/// Summarize the report to the console.
///
/// Prints a table of section sizes, the flags, and every list section one value per line.
pub fn summarize_report(report: &Report) {
    println!("Package: {}", report.file_name());
    println!(
        "Application name: {}\n",
        report.app_name().unwrap_or("<none>")
    );

    println!("{}\n", summary_table(report));
    println!("{}\n", flags_table(report));

    print_section("Application permissions", report.permissions());
    print_section("Application security codes", report.secret_codes());
    print_section("Libraries from manifest", report.manifest_libraries());
    print_section("Android libraries from packages", report.package_libraries());
    print_section("Native libraries", report.native_libraries());
    print_section(
        "Managed runtime (.dll) libraries",
        report.managed_runtime_libraries(),
    );
}

/// Create a table with the default preset styling.
fn default_table_preset() -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL_CONDENSED)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table
}

fn header(name: &str) -> Cell {
    Cell::new(name).add_attribute(Attribute::Bold)
}

/// Create a table with the number of entries per section.
fn summary_table(report: &Report) -> Table {
    let mut table = default_table_preset();
    table
        .set_header(vec![header("Section"), header("Count")])
        .add_row(vec![
            Cell::new("Permissions"),
            Cell::new(report.permissions().len()),
        ])
        .add_row(vec![Cell::new("Flags"), Cell::new(report.flags().len())])
        .add_row(vec![
            Cell::new("Security codes"),
            Cell::new(report.secret_codes().len()),
        ])
        .add_row(vec![
            Cell::new("Manifest libraries"),
            Cell::new(report.manifest_libraries().len()),
        ])
        .add_row(vec![
            Cell::new("Package libraries"),
            Cell::new(report.package_libraries().len()),
        ])
        .add_row(vec![
            Cell::new("Native libraries"),
            Cell::new(report.native_libraries().len()),
        ])
        .add_row(vec![
            Cell::new("Managed runtime libraries"),
            Cell::new(report.managed_runtime_libraries().len()),
        ])
        .add_row(vec![
            header("Uses DexClassLoader"),
            Cell::new(report.dynamic_class_loading())
                .add_attribute(Attribute::Bold),
        ]);
    table
}

/// Create a table with the application flags.
fn flags_table(report: &Report) -> Table {
    let mut table = default_table_preset();
    table.set_header(vec![header("Flag"), header("Value")]);
    for (flag, value) in report.flags() {
        table.add_row(vec![Cell::new(flag), Cell::new(value)]);
    }
    table
}

fn print_section<'a>(title: &str, values: impl IntoIterator<Item = &'a String>) {
    println!("{title}:");
    let mut empty = true;
    for value in values {
        println!("  {value}");
        empty = false;
    }
    if empty {
        println!("  <none>");
    }
    println!();
}
