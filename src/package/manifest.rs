//! The strongly-typed package manifest and its wire mapping.
//!
//! The wire form is an ordered JSON object (`format`, `name`, `description`,
//! `license`, `category`, `version`, `contacts`, `platforms`, `optimization`,
//! `dependencies`, `blockchain`). Field setters do not validate; the encoder
//! re-checks its own output against the schema walk and reports the verdict,
//! so a manifest mutated into an invalid state is caught before it reaches
//! disk.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::package::schema;

/// What kind of artifact the package builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
    StandardLibrary,
    Library,
    #[default]
    Executable,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::StandardLibrary => "std",
            Category::Library => "lib",
            Category::Executable => "exe",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "std" => Some(Category::StandardLibrary),
            "lib" => Some(Category::Library),
            "exe" => Some(Category::Executable),
            _ => None,
        }
    }
}

/// Package version triple. The wire form omits a zero patch component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Default for Version {
    fn default() -> Self {
        Self { major: 0, minor: 1, patch: 0 }
    }
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    pub fn encode(&self) -> String {
        if self.patch == 0 {
            format!("{}.{}", self.major, self.minor)
        } else {
            format!("{}.{}.{}", self.major, self.minor, self.patch)
        }
    }

    /// Parse `"M.N"` or `"M.N.P"`. The caller is expected to have run the
    /// schema walk first; this only fails on non-numeric segments.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = match parts.next() {
            Some(patch) => patch.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor, patch })
    }
}

/// A contact's relationship to the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContactRole {
    Owner,
    Contributor,
    Maintainer,
    Support,
}

impl ContactRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactRole::Owner => "owner",
            ContactRole::Contributor => "contributor",
            ContactRole::Maintainer => "maintainer",
            ContactRole::Support => "support",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(ContactRole::Owner),
            "contributor" => Some(ContactRole::Contributor),
            "maintainer" => Some(ContactRole::Maintainer),
            "support" => Some(ContactRole::Support),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub roles: BTreeSet<ContactRole>,
}

impl Contact {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        roles: BTreeSet<ContactRole>,
    ) -> Self {
        Self { name: name.into(), email: email.into(), phone: None, roles }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Platform allow/deny glob lists. Both default to a single `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platforms {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

impl Default for Platforms {
    fn default() -> Self {
        Self { allow: vec!["*".to_string()], deny: vec!["*".to_string()] }
    }
}

/// Compiler flag sets for the six pipeline stages of one profile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptimizationSwitch {
    pub alpha: BTreeSet<String>,
    pub beta: BTreeSet<String>,
    pub gamma: BTreeSet<String>,
    pub llvm: BTreeSet<String>,
    pub lto: BTreeSet<String>,
    pub runtime: BTreeSet<String>,
}

impl OptimizationSwitch {
    /// Convenience constructor taking one flag per stage, in stage order.
    pub fn uniform(
        alpha: &str,
        beta: &str,
        gamma: &str,
        llvm: &str,
        lto: &str,
        runtime: &str,
    ) -> Self {
        let one = |flag: &str| BTreeSet::from([flag.to_string()]);
        Self {
            alpha: one(alpha),
            beta: one(beta),
            gamma: one(gamma),
            llvm: one(llvm),
            lto: one(lto),
            runtime: one(runtime),
        }
    }

    fn stages(&self) -> [(&'static str, &BTreeSet<String>); 6] {
        [
            ("alpha", &self.alpha),
            ("beta", &self.beta),
            ("gamma", &self.gamma),
            ("llvm", &self.llvm),
            ("lto", &self.lto),
            ("runtime", &self.runtime),
        ]
    }
}

/// Minimum machine requirements for building the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    pub min_cores: u64,
    pub min_memory: u64,
    pub min_storage: u64,
}

impl Default for Requirements {
    fn default() -> Self {
        Self { min_cores: 1, min_memory: 2 * 1024 * 1024, min_storage: 0 }
    }
}

pub const REQUIRED_PROFILES: [&str; 3] = ["rapid", "debug", "release"];

/// Named optimization profiles plus build requirements. The `rapid`, `debug`
/// and `release` profiles always exist; removing one of them is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimization {
    profiles: BTreeMap<String, OptimizationSwitch>,
    pub requirements: Requirements,
}

impl Default for Optimization {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        for name in REQUIRED_PROFILES {
            profiles.insert(name.to_string(), OptimizationSwitch::default());
        }
        Self { profiles, requirements: Requirements::default() }
    }
}

impl Optimization {
    fn is_required_profile(name: &str) -> bool {
        REQUIRED_PROFILES.contains(&name)
    }

    pub fn rapid(&self) -> &OptimizationSwitch {
        &self.profiles["rapid"]
    }

    pub fn debug(&self) -> &OptimizationSwitch {
        &self.profiles["debug"]
    }

    pub fn release(&self) -> &OptimizationSwitch {
        &self.profiles["release"]
    }

    pub fn profile(&self, name: &str) -> Option<&OptimizationSwitch> {
        self.profiles.get(name)
    }

    pub fn contains_profile(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn set_profile(&mut self, name: impl Into<String>, switch: OptimizationSwitch) -> &mut Self {
        self.profiles.insert(name.into(), switch);
        self
    }

    /// Removes a profile unless it is one of the built-in three.
    pub fn remove_profile(&mut self, name: &str) -> &mut Self {
        if !Self::is_required_profile(name) {
            self.profiles.remove(name);
        }
        self
    }

    /// Drops every profile and reinstates empty built-ins.
    pub fn clear_profiles(&mut self) -> &mut Self {
        self.profiles.clear();
        for name in REQUIRED_PROFILES {
            self.profiles.insert(name.to_string(), OptimizationSwitch::default());
        }
        self
    }

    /// Additional (non-built-in) profile names, sorted.
    fn extra_profiles(&self) -> impl Iterator<Item = (&String, &OptimizationSwitch)> {
        self.profiles
            .iter()
            .filter(|(name, _)| !Self::is_required_profile(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub uuid: String,
    pub version: Version,
}

impl Dependency {
    pub fn new(uuid: impl Into<String>, version: Version) -> Self {
        Self { uuid: uuid.into(), version }
    }
}

/// Result of encoding a manifest to its wire form.
#[derive(Debug, Clone)]
pub struct EncodedManifest {
    pub text: String,
    /// Whether the encoded document passes the schema walk. Setters do not
    /// validate, so an in-memory manifest can hold values (a bogus license,
    /// a malformed name) that are only caught here.
    pub correct_schema: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    pub license: String,
    pub category: Category,
    pub version: Version,
    pub contacts: Vec<Contact>,
    pub platforms: Platforms,
    pub optimization: Optimization,
    pub dependencies: Vec<Dependency>,
    /// Ownership/signature chain entries, shape-checked but otherwise opaque.
    pub blockchain: Vec<Value>,
}

impl Manifest {
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            license: "LGPL-2.1".to_string(),
            category,
            version: Version::default(),
            contacts: Vec::new(),
            platforms: Platforms::default(),
            optimization: Optimization::default(),
            dependencies: Vec::new(),
            blockchain: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_optimization(mut self, optimization: Optimization) -> Self {
        self.optimization = optimization;
        self
    }

    /// The authoritative package-name grammar.
    pub fn name_regex() -> &'static str {
        schema::name_regex()
    }

    pub fn is_valid_name(name: &str) -> bool {
        schema::is_valid_name(name)
    }

    pub fn is_valid_license(license: &str) -> bool {
        schema::is_valid_license(license)
    }

    fn switch_to_json(switch: &OptimizationSwitch) -> Value {
        let mut object = Map::new();
        for (stage, flags) in switch.stages() {
            object.insert(stage.to_string(), json!(flags));
        }
        Value::Object(object)
    }

    /// Build the ordered wire object.
    pub fn to_json_value(&self) -> Value {
        let mut root = Map::new();

        root.insert("format".into(), json!("1.0"));
        root.insert("name".into(), json!(self.name));
        root.insert("description".into(), json!(self.description));
        root.insert("license".into(), json!(self.license));
        root.insert("category".into(), json!(self.category.as_str()));
        root.insert("version".into(), json!(self.version.encode()));

        let contacts: Vec<Value> = self
            .contacts
            .iter()
            .map(|contact| {
                let mut object = Map::new();
                object.insert("name".into(), json!(contact.name));
                object.insert("email".into(), json!(contact.email));
                if let Some(phone) = &contact.phone {
                    object.insert("phone".into(), json!(phone));
                }
                let roles: Vec<&str> = contact.roles.iter().map(ContactRole::as_str).collect();
                object.insert("roles".into(), json!(roles));
                Value::Object(object)
            })
            .collect();
        root.insert("contacts".into(), Value::Array(contacts));

        root.insert(
            "platforms".into(),
            json!({ "allow": self.platforms.allow, "deny": self.platforms.deny }),
        );

        let mut optimization = Map::new();
        for name in REQUIRED_PROFILES {
            let switch = self.optimization.profile(name).cloned().unwrap_or_default();
            optimization.insert(name.to_string(), json!({ "switch": Self::switch_to_json(&switch) }));
        }
        for (name, switch) in self.optimization.extra_profiles() {
            optimization.insert(name.clone(), json!({ "switch": Self::switch_to_json(switch) }));
        }
        let requirements = &self.optimization.requirements;
        optimization.insert(
            "requirements".into(),
            json!({
                "min-cores": requirements.min_cores,
                "min-memory": requirements.min_memory,
                "min-storage": requirements.min_storage,
            }),
        );
        root.insert("optimization".into(), Value::Object(optimization));

        let dependencies: Vec<Value> = self
            .dependencies
            .iter()
            .map(|dependency| {
                json!({ "uuid": dependency.uuid, "version": dependency.version.encode() })
            })
            .collect();
        root.insert("dependencies".into(), Value::Array(dependencies));

        root.insert("blockchain".into(), Value::Array(self.blockchain.clone()));

        Value::Object(root)
    }

    /// Encode to JSON text. `correct_schema` is false when the in-memory
    /// state fails the schema walk; the text is still produced so callers
    /// can show the offending document.
    pub fn to_json(&self, minify: bool) -> EncodedManifest {
        let document = self.to_json_value();
        let correct_schema = schema::verify_manifest_json(&document);

        let text = if minify {
            serde_json::to_string(&document)
        } else {
            serde_json::to_string_pretty(&document)
        }
        // Serialization of a Map<String, Value> cannot fail.
        .expect("manifest JSON encoding");

        EncodedManifest { text, correct_schema }
    }

    fn switch_from_json(value: &Value) -> OptimizationSwitch {
        let stage = |name: &str| -> BTreeSet<String> {
            value[name]
                .as_array()
                .map(|flags| {
                    flags
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        OptimizationSwitch {
            alpha: stage("alpha"),
            beta: stage("beta"),
            gamma: stage("gamma"),
            llvm: stage("llvm"),
            lto: stage("lto"),
            runtime: stage("runtime"),
        }
    }

    fn from_verified_json(document: &Value) -> Self {
        let mut manifest = Manifest::new(
            document["name"].as_str().unwrap_or_default(),
            Category::from_str(document["category"].as_str().unwrap_or_default())
                .unwrap_or_default(),
        );

        manifest.description = document["description"].as_str().unwrap_or_default().to_string();
        manifest.license = document["license"].as_str().unwrap_or_default().to_string();
        manifest.version =
            Version::parse(document["version"].as_str().unwrap_or_default()).unwrap_or_default();

        if let Some(contacts) = document["contacts"].as_array() {
            for contact in contacts {
                let roles = contact["roles"]
                    .as_array()
                    .map(|roles| {
                        roles
                            .iter()
                            .filter_map(Value::as_str)
                            .filter_map(ContactRole::from_str)
                            .collect()
                    })
                    .unwrap_or_default();

                let mut entry = Contact::new(
                    contact["name"].as_str().unwrap_or_default(),
                    contact["email"].as_str().unwrap_or_default(),
                    roles,
                );
                if let Some(phone) = contact.get("phone").and_then(Value::as_str) {
                    entry.phone = Some(phone.to_string());
                }
                manifest.contacts.push(entry);
            }
        }

        let string_list = |value: &Value| -> Vec<String> {
            value
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };
        manifest.platforms = Platforms {
            allow: string_list(&document["platforms"]["allow"]),
            deny: string_list(&document["platforms"]["deny"]),
        };

        let optimization = &document["optimization"];
        if let Some(object) = optimization.as_object() {
            for (name, profile) in object {
                if name == "requirements" {
                    continue;
                }
                manifest
                    .optimization
                    .set_profile(name.clone(), Self::switch_from_json(&profile["switch"]));
            }
        }
        let requirements = &optimization["requirements"];
        manifest.optimization.requirements = Requirements {
            min_cores: requirements["min-cores"].as_u64().unwrap_or(1),
            min_memory: requirements["min-memory"].as_u64().unwrap_or(0),
            min_storage: requirements["min-storage"].as_u64().unwrap_or(0),
        };

        if let Some(dependencies) = document["dependencies"].as_array() {
            for dependency in dependencies {
                manifest.dependencies.push(Dependency::new(
                    dependency["uuid"].as_str().unwrap_or_default(),
                    Version::parse(dependency["version"].as_str().unwrap_or_default())
                        .unwrap_or_default(),
                ));
            }
        }

        manifest.blockchain = document["blockchain"].as_array().cloned().unwrap_or_default();

        manifest
    }

    /// Parse and validate a manifest document. None on malformed JSON or any
    /// schema failure; there is no partial acceptance.
    pub fn from_json(text: &str) -> Option<Self> {
        let document: Value = match serde_json::from_str(text) {
            Ok(document) => document,
            Err(e) => {
                debug!("Failed to parse manifest JSON: {e}");
                return None;
            }
        };

        if !schema::verify_manifest_json(&document) {
            return None;
        }

        Some(Self::from_verified_json(&document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_manifest() -> Manifest {
        Manifest::new("@gh-x/abc", Category::Executable)
            .with_license("MIT")
            .with_version(Version::new(0, 1, 0))
    }

    #[test]
    fn test_version_encoding_omits_zero_patch() {
        assert_eq!(Version::new(0, 1, 0).encode(), "0.1");
        assert_eq!(Version::new(1, 2, 3).encode(), "1.2.3");
        assert_eq!(Version::parse("0.1"), Some(Version::new(0, 1, 0)));
        assert_eq!(Version::parse("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(Version::parse("1"), None);
        assert_eq!(Version::parse("1.2.3.4"), None);
    }

    #[test]
    fn test_default_manifest_wire_form() {
        let encoded = example_manifest().to_json(false);
        assert!(encoded.correct_schema);

        let document: Value = serde_json::from_str(&encoded.text).unwrap();
        let keys: Vec<&String> = document.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            [
                "format",
                "name",
                "description",
                "license",
                "category",
                "version",
                "contacts",
                "platforms",
                "optimization",
                "dependencies",
                "blockchain"
            ]
        );

        assert_eq!(document["format"], "1.0");
        assert_eq!(document["version"], "0.1");
        assert_eq!(document["category"], "exe");
        assert_eq!(document["platforms"]["allow"], serde_json::json!(["*"]));
        assert_eq!(document["dependencies"], serde_json::json!([]));
        assert_eq!(document["blockchain"], serde_json::json!([]));

        for profile in ["rapid", "debug", "release"] {
            let switch = &document["optimization"][profile]["switch"];
            for stage in ["alpha", "beta", "gamma", "llvm", "lto", "runtime"] {
                assert_eq!(switch[stage], serde_json::json!([]), "{profile}.{stage}");
            }
        }
        assert_eq!(document["optimization"]["requirements"]["min-cores"], 1);
        assert_eq!(document["optimization"]["requirements"]["min-memory"], 2_097_152);
        assert_eq!(document["optimization"]["requirements"]["min-storage"], 0);
    }

    #[test]
    fn test_roundtrip() {
        let mut manifest = example_manifest().with_description("A thing");
        manifest.contacts.push(
            Contact::new(
                "Jane",
                "jane@example.com",
                BTreeSet::from([ContactRole::Owner, ContactRole::Maintainer]),
            )
            .with_phone("+1-555-0100"),
        );
        manifest.dependencies.push(Dependency::new(
            "01234567-89ab-cdef-0123-456789abcdef",
            Version::new(2, 0, 1),
        ));
        manifest.optimization.set_profile(
            "bench",
            OptimizationSwitch::uniform("-O2", "-O2", "-O2", "-O3", "-O0", "-O1"),
        );

        let encoded = manifest.to_json(false);
        assert!(encoded.correct_schema);

        let decoded = Manifest::from_json(&encoded.text).expect("roundtrip decode");
        assert_eq!(decoded, manifest);

        // Encoding is a fixpoint, including key order.
        assert_eq!(decoded.to_json(false).text, encoded.text);
    }

    #[test]
    fn test_invalid_state_flagged_by_encoder() {
        let mut manifest = example_manifest();
        manifest.license = "Totally-Made-Up".to_string();
        assert!(!manifest.to_json(true).correct_schema);

        let mut manifest = example_manifest();
        manifest.name = "@foo/bar".to_string();
        assert!(!manifest.to_json(true).correct_schema);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(Manifest::from_json("{not json").is_none());
        assert!(Manifest::from_json("{}").is_none());
        assert!(Manifest::from_json("[]").is_none());
    }

    #[test]
    fn test_required_profiles_survive_removal() {
        let mut optimization = Optimization::default();
        optimization.set_profile("bench", OptimizationSwitch::default());

        optimization.remove_profile("debug");
        assert!(optimization.contains_profile("debug"));

        optimization.remove_profile("bench");
        assert!(!optimization.contains_profile("bench"));

        optimization.set_profile("bench", OptimizationSwitch::default());
        optimization.clear_profiles();
        assert!(optimization.contains_profile("rapid"));
        assert!(optimization.contains_profile("debug"));
        assert!(optimization.contains_profile("release"));
        assert!(!optimization.contains_profile("bench"));
    }

    #[test]
    fn test_minified_output_is_single_line() {
        let encoded = example_manifest().to_json(true);
        assert!(encoded.correct_schema);
        assert!(!encoded.text.contains('\n'));
    }
}
