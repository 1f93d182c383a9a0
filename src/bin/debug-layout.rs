/// Diagnostic tool to verify the items → hierarchy → layout pipeline
use std::path::PathBuf;

use anyhow::{bail, Context};
use voronoi_treemap::geometry::{ClipPolygon, Point};
use voronoi_treemap::items::WeightedItem;
use voronoi_treemap::layout::{compute_layout, LayoutConfig};
use voronoi_treemap::tree;

/// Parse `name,value[,group]` rows. Blank lines and `#` comments are skipped,
/// as is a leading row whose value column is not a number (a header).
fn read_items(path: &PathBuf) -> anyhow::Result<Vec<WeightedItem>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut items = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 2 {
            bail!("{}:{}: expected name,value[,group]", path.display(), line_no + 1);
        }
        let value: f64 = match fields[1].parse() {
            Ok(v) => v,
            Err(_) if items.is_empty() => continue,
            Err(e) => bail!("{}:{}: bad value '{}': {}", path.display(), line_no + 1, fields[1], e),
        };
        let item = match fields.get(2).filter(|g| !g.is_empty()) {
            Some(group) => WeightedItem::grouped(fields[0], value, group),
            None => WeightedItem::new(fields[0], value),
        };
        items.push(item);
    }
    Ok(items)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voronoi_treemap=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(items_path) = args.next().map(PathBuf::from) else {
        bail!("usage: debug-layout <items.csv> [width] [height] [seed] [--sort]");
    };
    let rest: Vec<String> = args.collect();
    let sort = rest.iter().any(|a| a == "--sort");
    let numbers: Vec<&String> = rest.iter().filter(|a| !a.starts_with("--")).collect();
    let width: f64 = numbers.first().map(|s| s.parse()).transpose()?.unwrap_or(800.0);
    let height: f64 = numbers.get(1).map(|s| s.parse()).transpose()?.unwrap_or(600.0);

    let mut config = LayoutConfig::default();
    if let Some(seed) = numbers.get(2) {
        config.random_seed = seed.parse().context("seed must be an unsigned integer")?;
    }

    println!("=== DIAGNOSTIC: Items → Voronoi Treemap ===");

    let items = read_items(&items_path)?;
    println!("\n[1] Read {} items from {}", items.len(), items_path.display());

    let mut hierarchy = tree::build_hierarchy(&items)?;
    if sort {
        tree::aggregate::sort_children_by_weight(&mut hierarchy);
    }
    println!(
        "\n[2] Hierarchy built: {} nodes, total weight {}",
        hierarchy.len(),
        hierarchy.total_weight()
    );

    // Circle inscribed in the viewport with 10px padding, 100 vertices.
    let radius = width.min(height) / 2.0 - 10.0;
    let clip = ClipPolygon::circle(Point::new(width / 2.0, height / 2.0), radius, 100)?;
    println!(
        "\n[3] Clip polygon: circle r={:.1} in {:.0}x{:.0}, area {:.1}",
        radius,
        width,
        height,
        clip.area()
    );

    let layout = compute_layout(&hierarchy, &clip, &config)?;
    println!("\n[4] Layout computed: {} cells", layout.len());

    println!("\n[5] Cells:");
    for (idx, cell) in layout.cells.iter().enumerate() {
        let anchor = cell.label_anchor();
        println!(
            "    {}{} '{}' (in {}) weight={} share={:.1}% area={:.1} target={:.3} err={:.2}% at ({:.1}, {:.1}), {} vertices",
            "  ".repeat(cell.depth as usize),
            if cell.is_leaf { "-" } else { "+" },
            cell.name,
            layout.parent_name(idx).unwrap_or("none"),
            cell.weight,
            layout.share_of_total(idx),
            cell.area,
            cell.target_fraction,
            cell.area_error * 100.0,
            anchor.x,
            anchor.y,
            cell.polygon.len()
        );
    }

    println!("\n[6] Checking for anomalies:");
    let leaf_area: f64 = layout.leaves().map(|c| c.area).sum();
    println!("    Total leaf area: {:.1}", leaf_area);
    println!("    Clip area:       {:.1}", clip.area());
    println!("    Coverage: {:.2}%", leaf_area / clip.area() * 100.0);
    if layout.converged() {
        println!("    All levels converged");
    }
    for warning in &layout.warnings {
        println!("    WARNING: {}", warning);
    }

    Ok(())
}
