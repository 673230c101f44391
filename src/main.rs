use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use log::{debug, info, warn};
use tokio::sync::broadcast;

use doclist_views::{
    columns::Column,
    config::load_config,
    protocol::ViewMessage,
    resolver::EffectiveConfiguration,
    store::{in_memory::InMemoryViewStore, FixedViewName},
    table_layout::{LayoutCell, TableLayout},
    view_state::ViewStateController,
    workspace::{load_workspace, parse_view_id},
};

/// Inspect how a custom view resolves and lays out against a workspace.
#[derive(Debug, Parser)]
#[command(name = "doclist_views", version)]
struct Cli {
    /// JSON workspace snapshot with `views`, `custom_fields` and `settings`.
    workspace: PathBuf,
    /// View to select: a numeric id or an ephemeral view key.
    #[arg(short, long)]
    view: Option<String>,
    /// Config file; defaults to `doclist_views.toml` in the user config dir.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log verbosity override.
    #[arg(long)]
    log_level: Option<log::LevelFilter>,
}

fn print_effective_configuration(effective: &EffectiveConfiguration, columns: &[Column]) {
    println!("Effective configuration");
    match effective.order_source {
        Some(source) => println!("  order source: {:?}", source),
        None => println!("  order source: default"),
    }
    for column in columns {
        println!(
            "  column {} ({:?}, {}) header='{}'",
            column.id,
            column.kind,
            column.display_type.as_key(),
            column.header
        );
    }
    for builtin in &effective.builtin_fields {
        match builtin.column_width {
            Some(width) => println!("  builtin {} width={}", builtin.id, width),
            None => println!("  builtin {}", builtin.id),
        }
    }
    for column in &effective.custom_field_columns {
        println!(
            "  custom field {} '{}' display={} width={}",
            column.field.id,
            column.field.name,
            column.display_type.as_key(),
            column
                .column_width
                .map(|width| width.to_string())
                .unwrap_or_else(|| "auto".to_string())
        );
    }
}

fn describe_cell(cell: Option<&LayoutCell>) -> String {
    match cell {
        None => "-".to_string(),
        Some(LayoutCell::SelectActions) => "[select]".to_string(),
        Some(LayoutCell::SubRowActions) => "[actions]".to_string(),
        Some(LayoutCell::Column(cell)) if cell.is_covered() => "<".to_string(),
        Some(LayoutCell::Column(cell)) if cell.is_spanning => format!("^{}", cell.column_id),
        Some(LayoutCell::Column(cell)) if cell.col_span > 1 => {
            format!("{} (x{})", cell.column_id, cell.col_span)
        }
        Some(LayoutCell::Column(cell)) => cell.column_id.clone(),
    }
}

fn print_layout(layout: &TableLayout) {
    println!("Table layout ({} slots)", layout.column_count());
    for (index, main_cell) in layout.main_row.iter().enumerate() {
        let sub_cell = layout.sub_row.get(index).and_then(Option::as_ref);
        println!(
            "  {:>2} | {:<24} | {:<24} | {}",
            index,
            describe_cell(Some(main_cell)),
            describe_cell(sub_cell),
            layout.header_labels.get(index).map(String::as_str).unwrap_or("")
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    let mut clog = colog::default_builder();
    clog.filter(
        None,
        cli.log_level
            .unwrap_or_else(|| config.logging.level.to_level_filter()),
    );
    clog.init();

    let workspace = load_workspace(&cli.workspace)?;
    info!(
        "Loaded workspace. views={} custom_fields={}",
        workspace.views.len(),
        workspace.custom_fields.len()
    );

    let (bus_sender, mut bus_receiver) = broadcast::channel(64);
    let store = Arc::new(InMemoryViewStore::with_views(workspace.views));
    let mut controller =
        ViewStateController::new(store, Box::new(FixedViewName(None)), bus_sender)
            .with_default_order(config.table.default_column_order.clone())
            .with_header_labels(config.table.header_labels.clone());
    controller.set_settings(workspace.settings);
    controller.set_catalog(workspace.custom_fields);
    controller.refresh_views()?;
    controller.select_view(cli.view.as_deref().map(parse_view_id))?;

    while let Ok(message) = bus_receiver.try_recv() {
        match message {
            ViewMessage::SchemaDriftDetected { view_id, warnings } => {
                println!("View {} drifted from the catalog:", view_id);
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            other => debug!("Bus message: {:?}", other),
        }
    }
    if controller.selected_view_id().is_none() {
        warn!("No view selected. Showing global settings.");
    }

    let effective = controller.effective_configuration();
    print_effective_configuration(&effective, &controller.columns());
    print_layout(&controller.table_layout());
    Ok(())
}
