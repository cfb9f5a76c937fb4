//! Text views for builtin commands

use crate::registry::CommandRegistry;

/// Machine status panel, rendered against a status map
pub const STATUS_TEMPLATE: &str = "State: {{.state}}{{if .alarm}} ({{.alarm}}){{end}}\n\
Position: X:{{.x:F2}} Y:{{.y:F2}} Z:{{.z:F2}}\n\
Feed: {{.feed:F0}} mm/min  Spindle: {{.speed:F0}} RPM\n\
Temperature: {{.temp:F1}} C";

/// Parameter table, rendered against a `get_parameters` response
pub const PARAMS_TEMPLATE: &str =
    "Machine parameters:\n{{range .parameters}}  {{.name}} = {{.value:F2}}{{end}}";

/// Tool table, rendered against a `get_tools` response
pub const TOOLS_TEMPLATE: &str = "Tool table:\n{{range .tools}}  T{{.id}}  D:{{.diameter:F3}}  L:{{.length:F3}}  {{.description}}{{end}}";

/// Catalog of every registered command and text alias
pub fn help(registry: &CommandRegistry) -> String {
    let mut lines = vec!["Available commands:".to_string()];
    for command in registry.commands() {
        let label = if command.aliases().is_empty() {
            command.name().to_string()
        } else {
            format!("{} ({})", command.name(), command.aliases().join(", "))
        };
        lines.push(format!("  {:<24} {}", label, command.description()));
    }

    if !registry.aliases().is_empty() {
        lines.push(String::new());
        lines.push("Aliases:".to_string());
        for (from, to) in registry.aliases() {
            lines.push(format!("  {:<24} {}", format!("\"{}\"", from), format!("-> \"{}\"", to)));
        }
    }
    lines.join("\n")
}
