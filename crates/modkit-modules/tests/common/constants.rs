//! Test constants for modkit-modules tests

#![allow(dead_code)]

pub const CORE_NS: &str = "Modkit.Modules.Core";
pub const CURRENCY_NS: &str = "Modkit.Modules.Currency";
pub const FEATURE_M_NS: &str = "Modkit.Modules.FeatureM";

pub const CORE_DEFINE: &str = "MODKIT_CORE";
pub const CURRENCY_DEFINE: &str = "MODKIT_CURRENCY";
pub const FEATURE_M_DEFINE: &str = "FEATURE_M";

pub const SYMBOL_FILE_NAME: &str = "modkit.rsp";
pub const DESCRIPTOR_FILE_NAME: &str = "module.yaml";

/// Catalog used by [`crate::common::ProjectFixture`]
pub const CATALOG_YAML: &str = r#"
modules:
  - namespace: Modkit.Modules.Core
    display_name: Core
    package: packages/core
    install_path: modules/core
    define: MODKIT_CORE
  - namespace: Modkit.Modules.Currency
    display_name: Currency
    package: packages/currency.tar.gz
    install_path: modules/currency
    define: MODKIT_CURRENCY
    prerequisites: [Modkit.Modules.Core]
  - namespace: Modkit.Modules.FeatureM
    display_name: Feature M
    package: packages/feature_m
    install_path: modules/feature_m
    define: FEATURE_M
"#;
