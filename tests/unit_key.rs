//! Unit tests for categories and component keys

use ferrous_wire::{Category, ComponentKey};
use std::collections::HashSet;

#[test]
fn test_category_inferred_from_suffix() {
    assert_eq!(Category::infer("UserService"), Category::Service);
    assert_eq!(Category::infer("AppController"), Category::Controller);
    assert_eq!(Category::infer("UserRepository"), Category::Repository);
    assert_eq!(Category::infer("Clock"), Category::Component);
}

#[test]
fn test_category_inference_ignores_case() {
    assert_eq!(Category::infer("legacy_SERVICE"), Category::Service);
    assert_eq!(Category::infer("usercontroller"), Category::Controller);
    // suffix, not substring
    assert_eq!(Category::infer("ServiceLocator"), Category::Component);
}

#[test]
fn test_category_search_order() {
    assert_eq!(
        Category::ALL,
        [Category::Component, Category::Controller, Category::Service, Category::Repository]
    );
}

#[test]
fn test_category_serde_uses_upper_case() {
    assert_eq!(serde_json::to_string(&Category::Repository).unwrap(), "\"REPOSITORY\"");
    let parsed: Category = serde_json::from_str("\"CONTROLLER\"").unwrap();
    assert_eq!(parsed, Category::Controller);
}

#[test]
fn test_key_display() {
    let key = ComponentKey::new(Category::Service, "UserService");
    assert_eq!(key.to_string(), "SERVICE:UserService");
    assert_eq!(key.identifier(), "UserService");
    assert_ne!(key.to_string(), "UserService");
}

#[test]
fn test_keys_in_different_categories_are_distinct() {
    let service = ComponentKey::new(Category::Service, "Users");
    let repository = ComponentKey::new(Category::Repository, "Users");
    assert_ne!(service, repository);

    let set: HashSet<_> = [service.clone(), repository, service].into_iter().collect();
    assert_eq!(set.len(), 2);
}
