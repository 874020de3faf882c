//! Structural validation of untrusted manifest JSON.
//!
//! The walk is all-or-nothing: every check must pass or the document is
//! rejected as a whole. Each failure is logged with the offending key so a
//! user can repair the file.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::package::spdx;

/// `8-4-4-4-12` hex, the dependency and ownership-chain identifier format.
static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    )
    .unwrap()
});

/// `N.N` or `N.N.N`, digits only.
static SEMVER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\d+(\.\d+)?$").unwrap());

/// The package-name grammar: `@`, optional ecosystem prefix, owner segment,
/// `/`, 3-32 char name segment, optional `:<generation>`.
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^@([a-z]+-)?([a-zA-Z0-9]+|[a-zA-Z0-9][a-zA-Z0-9-]+[a-zA-Z0-9])/([a-zA-Z0-9][a-zA-Z0-9-]{1,30}[a-zA-Z0-9])(:\d+)?$",
    )
    .unwrap()
});

pub(crate) fn name_regex() -> &'static str {
    NAME_RE.as_str()
}

macro_rules! schema_check {
    ($cond:expr, $what:expr) => {
        if !($cond) {
            debug!("Invalid manifest: schema check failed: {}", $what);
            return false;
        }
    };
}

pub(crate) fn is_valid_name(name: &str) -> bool {
    if !NAME_RE.is_match(name) {
        debug!("Package name failed format validation [grammar mismatch]: \"{name}\"");
        return false;
    }

    if name.contains("--") {
        debug!("Package name failed format validation [double hyphen]: \"{name}\"");
        return false;
    }

    // Only standard library packages may omit their Git provider prefix.
    let owner = &name[1..name.find('/').unwrap_or(name.len())];
    if !name.starts_with("@std/") && !owner.contains('-') {
        debug!("Package name failed format validation [missing Git provider prefix]: \"{name}\"");
        return false;
    }

    true
}

pub(crate) fn is_valid_license(license: &str) -> bool {
    if !spdx::is_exact_spdx_license_match(license) {
        debug!("Failed to find match in SPDX license table: \"{license}\"");
        return false;
    }

    true
}

fn is_semver(value: &Value) -> bool {
    value.as_str().is_some_and(|s| SEMVER_RE.is_match(s))
}

pub(crate) fn is_valid_uuid(uuid: &str) -> bool {
    UUID_RE.is_match(uuid)
}

fn is_string_array(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string))
}

fn validate_switch(value: &Value) -> bool {
    schema_check!(value.is_object(), "optimization switch is not an object");

    for stage in ["alpha", "beta", "gamma", "llvm", "lto", "runtime"] {
        let Some(flags) = value.get(stage) else {
            debug!("Invalid manifest: optimization switch is missing stage \"{stage}\"");
            return false;
        };
        schema_check!(is_string_array(flags), "optimization switch stage flags");
    }

    true
}

fn validate_profile(name: &str, value: &Value) -> bool {
    schema_check!(value.is_object(), "optimization profile is not an object");

    let Some(switch) = value.get("switch") else {
        debug!("Invalid manifest: optimization profile \"{name}\" is missing \"switch\"");
        return false;
    };

    validate_switch(switch)
}

fn validate_optimization(value: &Value) -> bool {
    schema_check!(value.is_object(), "optimization is not an object");
    let object = value.as_object().unwrap();

    for required in ["rapid", "debug", "release"] {
        schema_check!(object.contains_key(required), "required optimization profile");
    }

    for (key, profile) in object {
        if key == "requirements" {
            continue;
        }
        if !validate_profile(key, profile) {
            return false;
        }
    }

    let Some(requirements) = object.get("requirements") else {
        debug!("Invalid manifest: optimization is missing \"requirements\"");
        return false;
    };
    schema_check!(requirements.is_object(), "optimization requirements");

    for key in ["min-cores", "min-memory", "min-storage"] {
        let Some(bound) = requirements.get(key) else {
            debug!("Invalid manifest: optimization requirements is missing \"{key}\"");
            return false;
        };
        schema_check!(bound.is_u64(), "optimization requirements bound");
    }

    true
}

fn validate_contact(value: &Value) -> bool {
    schema_check!(value.is_object(), "contact is not an object");

    schema_check!(
        value.get("name").is_some_and(Value::is_string),
        "contact name"
    );
    schema_check!(
        value.get("email").is_some_and(Value::is_string),
        "contact email"
    );

    if let Some(phone) = value.get("phone") {
        schema_check!(phone.is_string(), "contact phone");
    }

    let Some(roles) = value.get("roles").and_then(Value::as_array) else {
        debug!("Invalid manifest: contact roles is missing or not an array");
        return false;
    };

    roles.iter().all(|role| {
        role.as_str()
            .is_some_and(|r| matches!(r, "owner" | "contributor" | "maintainer" | "support"))
    })
}

fn validate_keypair(value: &Value) -> bool {
    schema_check!(value.is_object(), "ownership-chain pubkey");
    schema_check!(
        value.get("type").and_then(Value::as_str) == Some("ed25519"),
        "ownership-chain pubkey type"
    );
    schema_check!(
        value
            .get("value")
            .and_then(Value::as_str)
            .is_some_and(|v| v.len() == 64 && v.bytes().all(|b| b.is_ascii_hexdigit())),
        "ownership-chain pubkey value"
    );
    schema_check!(
        value.as_object().unwrap().len() == 2,
        "ownership-chain pubkey extra keys"
    );

    true
}

fn validate_signature(value: &Value) -> bool {
    schema_check!(value.is_object(), "ownership-chain signature");
    schema_check!(
        value.get("type").and_then(Value::as_str) == Some("ed25519"),
        "ownership-chain signature type"
    );
    schema_check!(
        value
            .get("value")
            .and_then(Value::as_str)
            .is_some_and(|v| v.len() == 128 && v.bytes().all(|b| b.is_ascii_hexdigit())),
        "ownership-chain signature value"
    );

    true
}

fn validate_blockchain(value: &Value) -> bool {
    schema_check!(value.is_array(), "blockchain is not an array");

    value.as_array().unwrap().iter().all(|item| {
        schema_check!(item.is_object(), "blockchain item");
        schema_check!(
            item.get("uuid")
                .and_then(Value::as_str)
                .is_some_and(is_valid_uuid),
            "blockchain item uuid"
        );
        schema_check!(
            item.get("category").and_then(Value::as_str).is_some_and(|c| {
                matches!(
                    c,
                    "eco-root" | "eco-domain" | "user-account" | "package" | "subpackage"
                )
            }),
            "blockchain item category"
        );

        let Some(pubkey) = item.get("pubkey") else {
            debug!("Invalid manifest: blockchain item is missing \"pubkey\"");
            return false;
        };
        if !validate_keypair(pubkey) {
            return false;
        }

        let Some(signature) = item.get("signature") else {
            debug!("Invalid manifest: blockchain item is missing \"signature\"");
            return false;
        };
        validate_signature(signature)
    })
}

/// Walk an untrusted manifest document and verify every structural rule.
pub fn verify_manifest_json(document: &Value) -> bool {
    schema_check!(document.is_object(), "root is not an object");

    {
        let Some(format) = document.get("format") else {
            debug!("Invalid manifest: missing \"format\"");
            return false;
        };
        schema_check!(is_semver(format), "format version");
        schema_check!(
            format.as_str().unwrap().starts_with("1."),
            "format major version"
        );
    }

    schema_check!(
        document
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(is_valid_name),
        "package name"
    );

    schema_check!(
        document.get("description").is_some_and(Value::is_string),
        "description"
    );

    schema_check!(
        document
            .get("license")
            .and_then(Value::as_str)
            .is_some_and(is_valid_license),
        "license"
    );

    schema_check!(
        document
            .get("category")
            .and_then(Value::as_str)
            .is_some_and(|c| matches!(c, "std" | "lib" | "exe")),
        "category"
    );

    {
        let Some(version) = document.get("version") else {
            debug!("Invalid manifest: missing \"version\"");
            return false;
        };
        schema_check!(is_semver(version), "package version");
    }

    {
        let Some(contacts) = document.get("contacts").and_then(Value::as_array) else {
            debug!("Invalid manifest: contacts is missing or not an array");
            return false;
        };
        if !contacts.iter().all(validate_contact) {
            return false;
        }
    }

    {
        let Some(platforms) = document.get("platforms") else {
            debug!("Invalid manifest: missing \"platforms\"");
            return false;
        };
        schema_check!(platforms.is_object(), "platforms");
        schema_check!(
            platforms.get("allow").is_some_and(is_string_array),
            "platforms allow list"
        );
        schema_check!(
            platforms.get("deny").is_some_and(is_string_array),
            "platforms deny list"
        );
    }

    {
        let Some(optimization) = document.get("optimization") else {
            debug!("Invalid manifest: missing \"optimization\"");
            return false;
        };
        if !validate_optimization(optimization) {
            return false;
        }
    }

    {
        let Some(dependencies) = document.get("dependencies").and_then(Value::as_array) else {
            debug!("Invalid manifest: dependencies is missing or not an array");
            return false;
        };

        for dependency in dependencies {
            schema_check!(dependency.is_object(), "dependency");
            schema_check!(
                dependency
                    .get("uuid")
                    .and_then(Value::as_str)
                    .is_some_and(is_valid_uuid),
                "dependency uuid"
            );
            let Some(version) = dependency.get("version") else {
                debug!("Invalid manifest: dependency is missing \"version\"");
                return false;
            };
            schema_check!(is_semver(version), "dependency version");
        }
    }

    {
        let Some(blockchain) = document.get("blockchain") else {
            debug!("Invalid manifest: missing \"blockchain\"");
            return false;
        };
        if !validate_blockchain(blockchain) {
            return false;
        }
    }

    true
}
