use crate::config::Source;
use crate::error::LayerError;
use crate::models::resource::{LayerRole, ResourceKind, ResourceSpec, Rgba};
use crate::reader::catalog::Catalog;
use crate::traits::ResourceProbe;
use comfy_table::{Attribute, Cell, CellAlignment, Table};
use indicatif::{ProgressBar, ProgressStyle};

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| {
            Cell::new(t)
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Center)
        })
        .collect()
}

fn swatch(colour: Option<Rgba>) -> String {
    match colour {
        Some([r, g, b, _]) => format!("\x1b[38;2;{};{};{}m█\x1b[0m", r, g, b),
        None => " ".to_string(),
    }
}

fn range_str(spec: &ResourceSpec) -> String {
    match (spec.kind, spec.options.min, spec.options.max) {
        (ResourceKind::GeoJson, _, _) => "-".to_string(),
        (_, Some(min), Some(max)) => format!("{}…{}", min, max),
        (_, _, _) if spec.options.normalize => "auto".to_string(),
        _ => "raw".to_string(),
    }
}

/// Prints the configured layers and any configuration warnings.
pub fn print_catalog_summary(catalog: &Catalog) {
    let mut table = Table::new();
    table
        .set_header(header(&[
            "", "Key", "Role", "Kind", "File", "Opacity", "Bands", "Range", "Style",
        ]))
        .load_preset(comfy_table::presets::ASCII_BORDERS_ONLY_CONDENSED);

    let mut warnings = Vec::new();
    for spec in catalog.resources() {
        let mut flag = "✅";
        if spec.kind == ResourceKind::GeoTiff
            && !spec.options.normalize
            && (spec.options.min.is_none() || spec.options.max.is_none())
        {
            warnings.push(format!(
                "  ⚠️ {}: no normalisation and no min/max, values are shown unscaled",
                spec.key
            ));
            flag = "⚠️";
        }
        if spec.role == LayerRole::Base && spec.fit_on_load {
            warnings.push(format!(
                "  ⚠️ {}: fit_on_load only applies to overlays, base layers always fit",
                spec.key
            ));
            flag = "⚠️";
        }

        let bands = spec
            .options
            .bands
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let style = spec
            .style
            .as_ref()
            .map(|s| format!("{}{}", swatch(s.stroke), swatch(s.fill)))
            .unwrap_or_default();

        table.add_row(vec![
            Cell::new(flag).set_alignment(CellAlignment::Center),
            Cell::new(&spec.key),
            Cell::new(spec.role),
            Cell::new(spec.kind),
            Cell::new(&spec.path),
            Cell::new(format!("{:.1}", spec.opacity)).set_alignment(CellAlignment::Center),
            Cell::new(bands).set_alignment(CellAlignment::Center),
            Cell::new(range_str(spec)).set_alignment(CellAlignment::Center),
            Cell::new(style),
        ]);
    }

    println!("\nLayers:\n{}", table);
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in warnings {
            println!("{}", warning);
        }
    }
    println!();
}

/// Probes every catalog entry, showing progress. Returns the failures.
pub async fn check_resources(
    catalog: &Catalog,
    source: &Source,
    probe: &dyn ResourceProbe,
) -> Vec<(String, LayerError)> {
    let pb = ProgressBar::new(catalog.resources().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n[{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▇▆▅▄▃▂▁  "),
    );

    let mut failures = Vec::new();
    for spec in catalog.resources() {
        let locator = source.locate(&spec.path);
        pb.set_message(format!("Checking {:<30}", spec.path));
        if let Err(err) = probe.probe(&locator).await {
            failures.push((spec.key.clone(), err));
        }
        pb.inc(1);
    }

    if failures.is_empty() {
        pb.finish_with_message("✅ All layer files found");
    } else {
        pb.finish_with_message(format!("❌ {} layer file(s) missing", failures.len()));
        let mut table = Table::new();
        table
            .set_header(header(&["Key", "Problem"]))
            .load_preset(comfy_table::presets::ASCII_BORDERS_ONLY_CONDENSED);
        for (key, err) in &failures {
            table.add_row(vec![Cell::new(key), Cell::new(err)]);
        }
        println!("\n{}", table);
    }
    failures
}
