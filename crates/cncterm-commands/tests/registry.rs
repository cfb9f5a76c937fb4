//! Registry construction and text alias expansion

use cncterm_commands::{CommandKind, CommandRegistry};
use cncterm_core::ConfigurationError;
use cncterm_settings::{
    ApiCommandConfig, CommandSettings, MacroCommandConfig, MacroStep, SystemCommandConfig,
};
use proptest::prelude::*;

fn settings_with_aliases(aliases: &[(&str, &str)]) -> CommandSettings {
    let mut settings = CommandSettings::empty();
    for (from, to) in aliases {
        settings.aliases.insert(from.to_string(), to.to_string());
    }
    settings
}

#[test]
fn test_default_vocabulary_builds() {
    let registry = CommandRegistry::from_settings(&CommandSettings::default()).unwrap();

    let names: Vec<&str> = registry.commands().iter().map(|c| c.name()).collect();
    let mut sorted = names.clone();
    sorted.sort_by_key(|n| n.to_ascii_lowercase());
    assert_eq!(names, sorted);

    assert!(names.iter().all(|n| n.starts_with('/')));
    assert!(registry.find_system("quit").is_some());
    assert!(registry.find_macro("/HOMING").is_some());
    assert_eq!(registry.find_macro("park").unwrap().kind(), CommandKind::Macro);
}

#[test]
fn test_names_and_aliases_normalized() {
    let mut settings = CommandSettings::empty();
    settings.system.insert(
        "  Help ".to_string(),
        SystemCommandConfig::new("builtin:help").with_aliases(["?", "/?", "H", "h"]),
    );
    let registry = CommandRegistry::from_settings(&settings).unwrap();

    let help = &registry.system_commands()[0];
    assert_eq!(help.name(), "/Help");
    assert_eq!(help.aliases(), ["/?", "/H"]);
    assert!(help.matches_name("/help"));
}

#[test]
fn test_malformed_pattern_fails() {
    let mut settings = CommandSettings::empty();
    settings
        .api
        .insert("broken".to_string(), ApiCommandConfig::new(r"^G(\d+", "execute"));

    match CommandRegistry::from_settings(&settings) {
        Err(ConfigurationError::InvalidPattern { command, .. }) => assert_eq!(command, "/broken"),
        other => panic!("expected InvalidPattern, got {:?}", other),
    }
}

#[test]
fn test_api_declaration_order_kept() {
    let mut settings = CommandSettings::empty();
    settings.api.insert("zeta".to_string(), ApiCommandConfig::new("^z", "execute"));
    settings.api.insert("alpha".to_string(), ApiCommandConfig::new("^a", "execute"));
    settings.macros.insert(
        "beta".to_string(),
        MacroCommandConfig::new(vec![MacroStep::new("get_status")]),
    );
    let registry = CommandRegistry::from_settings(&settings).unwrap();

    let api: Vec<&str> = registry.api_commands().iter().map(|c| c.name()).collect();
    assert_eq!(api, ["/zeta", "/alpha"]);
    let all: Vec<&str> = registry.commands().iter().map(|c| c.name()).collect();
    assert_eq!(all, ["/alpha", "/beta", "/zeta"]);
}

#[test]
fn test_expand_alias_first_match_wins() {
    let registry = CommandRegistry::from_settings(&settings_with_aliases(&[
        ("/h ", "/help "),
        ("/h", "/hold"),
    ]))
    .unwrap();

    assert_eq!(
        registry.expand_alias("/H topics"),
        ("/help topics".to_string(), true)
    );
    assert_eq!(registry.expand_alias("/h"), ("/hold".to_string(), true));
    assert_eq!(registry.expand_alias("status"), ("status".to_string(), false));
}

#[test]
fn test_duplicate_alias_keys_keep_first() {
    let registry = CommandRegistry::from_settings(&settings_with_aliases(&[
        ("g ", "G0 "),
        ("G ", "G1 "),
    ]))
    .unwrap();

    assert_eq!(registry.aliases().len(), 1);
    assert_eq!(registry.expand_alias("G X1"), ("G0 X1".to_string(), true));
}

#[test]
fn test_alias_cycle_still_builds() {
    let registry = CommandRegistry::from_settings(&settings_with_aliases(&[
        ("a", "b"),
        ("b", "a"),
    ]))
    .unwrap();
    assert_eq!(registry.expand_alias("a"), ("b".to_string(), true));
}

proptest! {
    #[test]
    fn prop_unmatched_input_is_a_fixed_point(input in "[a-z0-9 ]{0,16}") {
        let registry = CommandRegistry::from_settings(&settings_with_aliases(&[
            ("/h ", "/help "),
            ("/s ", "/status "),
        ]))
        .unwrap();

        let (expanded, matched) = registry.expand_alias(&input);
        prop_assert!(!matched);
        prop_assert_eq!(&expanded, &input);
        prop_assert_eq!(registry.expand_alias(&expanded), (input.clone(), false));
    }
}
