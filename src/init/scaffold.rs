//! Generators for the files a freshly initialized package starts with.

use crate::package::{Category, Manifest};

use super::InitOptions;

static DOCKER_IGNORE: &str = ".no3/
.git/
";

static GIT_IGNORE: &str = "# Prerequisites
*.d

# Compiled Object files
*.slo
*.lo
*.o
*.obj

# Precompiled Headers
*.gch
*.pch

# Compiled Dynamic libraries
*.so
*.dylib
*.dll

# Fortran module files
*.mod
*.smod

# Compiled Static libraries
*.lai
*.la
*.a
*.lib

# Executables
*.exe
*.out
*.app

# Nitrate specific artifacts
.no3/

# Other
";

static CODE_OF_CONDUCT_MD: &str = r#"# Contributor Covenant Code of Conduct

## Our Pledge

We as members, contributors, and leaders pledge to make participation in our
community a harassment-free experience for everyone, regardless of age, body
size, visible or invisible disability, ethnicity, sex characteristics, gender
identity and expression, level of experience, education, socio-economic status,
nationality, personal appearance, race, caste, color, religion, or sexual
identity and orientation.

We pledge to act and interact in ways that contribute to an open, welcoming,
diverse, inclusive, and healthy community.

## Our Standards

Examples of behavior that contributes to a positive environment for our
community include:

* Demonstrating empathy and kindness toward other people
* Being respectful of differing opinions, viewpoints, and experiences
* Giving and gracefully accepting constructive feedback
* Accepting responsibility and apologizing to those affected by our mistakes,
  and learning from the experience
* Focusing on what is best not just for us as individuals, but for the overall
  community

Examples of unacceptable behavior include:

* The use of sexualized language or imagery, and sexual attention or advances of
  any kind
* Trolling, insulting or derogatory comments, and personal or political attacks
* Public or private harassment
* Publishing others' private information, such as a physical or email address,
  without their explicit permission
* Other conduct which could reasonably be considered inappropriate in a
  professional setting

## Enforcement Responsibilities

Community leaders are responsible for clarifying and enforcing our standards of
acceptable behavior and will take appropriate and fair corrective action in
response to any behavior that they deem inappropriate, threatening, offensive,
or harmful.

Community leaders have the right and responsibility to remove, edit, or reject
comments, commits, code, wiki edits, issues, and other contributions that are
not aligned to this Code of Conduct, and will communicate reasons for moderation
decisions when appropriate.

## Scope

This Code of Conduct applies within all community spaces, and also applies when
an individual is officially representing the community in public spaces.
Examples of representing our community include using an official email address,
posting via an official social media account, or acting as an appointed
representative at an online or offline event.

## Enforcement

Instances of abusive, harassing, or otherwise unacceptable behavior may be
reported to the community leaders responsible for enforcement at
[INSERT CONTACT METHOD].
All complaints will be reviewed and investigated promptly and fairly.

All community leaders are obligated to respect the privacy and security of the
reporter of any incident.

## Enforcement Guidelines

Community leaders will follow these Community Impact Guidelines in determining
the consequences for any action they deem in violation of this Code of Conduct:

### 1. Correction

**Community Impact**: Use of inappropriate language or other behavior deemed
unprofessional or unwelcome in the community.

**Consequence**: A private, written warning from community leaders, providing
clarity around the nature of the violation and an explanation of why the
behavior was inappropriate. A public apology may be requested.

### 2. Warning

**Community Impact**: A violation through a single incident or series of
actions.

**Consequence**: A warning with consequences for continued behavior. No
interaction with the people involved, including unsolicited interaction with
those enforcing the Code of Conduct, for a specified period of time. This
includes avoiding interactions in community spaces as well as external channels
like social media. Violating these terms may lead to a temporary or permanent
ban.

### 3. Temporary Ban

**Community Impact**: A serious violation of community standards, including
sustained inappropriate behavior.

**Consequence**: A temporary ban from any sort of interaction or public
communication with the community for a specified period of time. No public or
private interaction with the people involved, including unsolicited interaction
with those enforcing the Code of Conduct, is allowed during this period.
Violating these terms may lead to a permanent ban.

### 4. Permanent Ban

**Community Impact**: Demonstrating a pattern of violation of community
standards, including sustained inappropriate behavior, harassment of an
individual, or aggression toward or disparagement of classes of individuals.

**Consequence**: A permanent ban from any sort of public interaction within the
community.

## Attribution

This Code of Conduct is adapted from the [Contributor Covenant][homepage],
version 2.1, available at
[https://www.contributor-covenant.org/version/2/1/code_of_conduct.html][v2.1].

Community Impact Guidelines were inspired by
[Mozilla's code of conduct enforcement ladder][Mozilla CoC].

For answers to common questions about this code of conduct, see the FAQ at
[https://www.contributor-covenant.org/faq][FAQ]. Translations are available at
[https://www.contributor-covenant.org/translations][translations].

[homepage]: https://www.contributor-covenant.org
[v2.1]: https://www.contributor-covenant.org/version/2/1/code_of_conduct.html
[Mozilla CoC]: https://github.com/mozilla/diversity
[FAQ]: https://www.contributor-covenant.org/faq
[translations]: https://www.contributor-covenant.org/translations
"#;

static LIB_SOURCE: &str = r#"@use "v1.0";

import std::io;

scope example_lib {
  pub fn foo(): i32 {
    print("Hello, world!");
    ret 20;
  }

  pub fn pure bar(x: i32, y: str): i32 {
    print("x: ", x, ", y: ", y);
    ret x + y.len();
  }
}
"#;

static MAIN_SOURCE: &str = r#"@use "v1.0";

import std.io;
import std.time;

pub fn main(args: [str]): i32 {
  let day = std::time::now().day_of_week();
  print(f"Welcome, it is a beautiful {day}!");

  if "--help" in args || "-h" in args {
    print("Usage: main [options]");
    print("Options:");
    print("  --help: Display this help message.");
    print("  --version: Display the version of the program.");
    ret 0;
  }

  if "--version" in args || "-v" in args {
    print("main v1.0.0");
    ret 0;
  }

  ret 0;
}
"#;

pub fn git_keep() -> &'static str {
    ""
}

pub fn git_ignore() -> &'static str {
    GIT_IGNORE
}

pub fn docker_ignore() -> &'static str {
    DOCKER_IGNORE
}

pub fn default_library_source() -> &'static str {
    LIB_SOURCE
}

pub fn default_main_source() -> &'static str {
    MAIN_SOURCE
}

pub fn code_of_conduct() -> &'static str {
    CODE_OF_CONDUCT_MD
}

/// The GitHub username embedded in a `@gh-<user>/...` package name.
pub(super) fn github_username(package_name: &str) -> Option<&str> {
    let rest = package_name.strip_prefix("@gh-")?;
    Some(&rest[..rest.find('/')?])
}

/// The name segment after the owner, without any generation suffix.
pub(super) fn package_tail(package_name: &str) -> &str {
    let tail = match package_name.find('/') {
        Some(slash) => &package_name[slash + 1..],
        None => package_name,
    };
    match tail.find(':') {
        Some(colon) => &tail[..colon],
        None => tail,
    }
}

/// Title-case a package tail for prose: hyphens become spaces and each word
/// is capitalized.
pub(super) fn beautify_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;

    for ch in name.chars() {
        if ch == '-' {
            out.push(' ');
            at_word_start = true;
        } else if at_word_start {
            out.extend(ch.to_uppercase());
            at_word_start = false;
        } else {
            out.push(ch);
        }
    }

    out
}

fn url_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02x}"));
        }
    }
    out
}

/// shields.io badge segments double their hyphens before URL encoding.
fn shields_io_escape(text: &str) -> String {
    url_encode(&text.replace('-', "--"))
}

pub fn security_policy(package_name: &str) -> String {
    let github_username = github_username(package_name);
    let name = package_tail(package_name);
    let nice_name = beautify_name(name);

    let mut content = String::new();

    content.push_str(
        r#"# Reporting Security Issues

The ("{{project_name_nice}}") project team and community take security bugs in
the ("{{project_name_nice}}") project seriously.
We appreciate your efforts to disclose your findings responsibly and will make
every effort to acknowledge your contributions. Pursuant thereto, and contingent
on the notability of the issue and the availability of monetary resources, we
may offer a reward for the responsible disclosure of security vulnerabilities.

"#,
    );

    if let Some(github_username) = github_username {
        content.push_str(
            r#"Please use the GitHub Security Advisory
["Report a Vulnerability"](https://github.com/{{gh_username}}/{{project_name}}/security/advisories/new)
tab to report a security issue.

"#,
        );
        content = content.replace("{{gh_username}}", github_username);
    }

    content.push_str(
        r#"The ("{{project_name_nice}}") project team will send a response indicating the next steps in handling
your report. After the initial reply to your report, the security team will keep
you informed of the progress toward a fix and full announcement and may ask for
additional information or guidance.

Report security bugs in third-party modules to the person or team maintaining the module.

Thank you for keeping the ("{{project_name_nice}}") project and its community safe.

---
*This security policy is auto-generated for the ("{{project_name_nice}}") project.*
"#,
    );

    content
        .replace("{{project_name_nice}}", &nice_name)
        .replace("{{project_name}}", name)
}

pub fn readme(options: &InitOptions) -> String {
    let github_username = github_username(&options.package_name);
    let name = package_tail(&options.package_name);
    let nice_name = beautify_name(name);
    let shields_io_license = shields_io_escape(&options.package_license);
    let category = match options.package_category {
        Category::Library => "library",
        Category::StandardLibrary => "stdlib",
        Category::Executable => "exe",
    };

    let mut content = String::new();

    content.push_str(
        r#"# {{project_name_nice}}

![](https://img.shields.io/badge/license-{{project_escaped_spdx_license}}-b3e32d.svg)
![](https://img.shields.io/badge/package_kind-{{project_category}}-cyan.svg)
![](https://img.shields.io/badge/cmake_integration-true-purple.svg)

## Overview

{{project_description}}

## Table of Contents

- [{{project_name_nice}}](#{{project_name}})
  - [Overview](#overview)
  - [Table of Contents](#table-of-contents)
  - [Installation](#installation)
  - [Features](#features)
  - [Technology](#technology)
  - [Contributing](#contributing)
  - [License](#license)

## Installation

"#,
    );

    if github_username.is_some() {
        match options.package_category {
            Category::Library | Category::StandardLibrary => content.push_str(
                r#"```bash
# Change the working directory to your package
cd <your_project>

# Install this package as a dependency
nitrate install https://github.com/{{gh_username}}/{{project_name}}
```"#,
            ),
            Category::Executable => content.push_str(
                r#"```bash
nitrate install https://github.com/{{gh_username}}/{{project_name}}
```"#,
            ),
        }
        content = content.replace("{{gh_username}}", github_username.unwrap_or_default());
    } else if options.package_category == Category::StandardLibrary {
        content.push_str("This package should be installed by default with the Nitrate toolchain.");
    } else {
        content.push_str("TODO: Write instructions on how to install this package.");
    }

    content.push_str(
        r#"

## Features

| Feature Name | Feature Description                  |
| ------------ | ------------------------------------ |
| Feature A    | Providing better handling of issue A |
| Feature B    | Providing better handling of issue B |
| Feature C    | Providing better handling of issue C |

## Technology

| Tech Name        | URL                  |
| ---------------- | -------------------- |
| Nitrate Language | https://nitrate.dev/ |

## Contributing

Contributions are welcome! Please submit a pull request or open an issue if you have suggestions.

## License

This project is licensed under the **{{project_spdx_license}}** license. See the [LICENSE](LICENSE) file for more information.
"#,
    );

    content
        .replace("{{project_name_nice}}", &nice_name)
        .replace("{{project_name}}", name)
        .replace("{{project_escaped_spdx_license}}", &shields_io_license)
        .replace("{{project_spdx_license}}", &options.package_license)
        .replace("{{project_description}}", &options.package_description)
        .replace("{{project_category}}", category)
}

pub fn contributing_policy(options: &InitOptions) -> String {
    let nice_name = beautify_name(package_tail(&options.package_name));

    let content = r#"# Contributing to the ("{{project_name_nice}}") Project

**LEGAL NOTICE**

1. Regarding Your contributions and the legality thereof, all intellectual property
   delivered to the ("Maintainers") of this ("{{project_name_nice}}") project is
   required to be usable by the ("Maintainers") for any purpose reasonably
   foreseeable and/or expected by a software project maintainer.

2. To decline compliance with clause 1, conspicuously state these declinations at
least once per submission that does not comply with clause 1.

In summary, this means granting the project maintainers an eternal, worldwide, nonexclusive,
revocable license to use Your content to interact with You and the project's community.
The actual ownership of Your submissions is not affected by this clause.
"#;

    content.replace("{{project_name_nice}}", &nice_name)
}

pub fn cmake_lists(package_name: &str) -> String {
    let project_name = package_tail(package_name);

    let content = r#"cmake_minimum_required(VERSION 3.15)
set(THIS_PROJECT_NAME "nitrate-{{project_name}}")
project(${THIS_PROJECT_NAME})

################################################################################
# USER CONFIGURATION SECTION
################################################################################
set(PACKAGE_DIRECTORY "${CMAKE_CURRENT_SOURCE_DIR}")
find_program(NITRATE_TOOL_EXE "nitrate" REQUIRED)

################################################################################
# SCRIPT INVARIANT ASSERTIONS
################################################################################
message(STATUS "Found compiler at ${NITRATE_TOOL_EXE}")
if(NOT BUILD_MODE)
  set(BUILD_MODE "--rapid")
elseif(NOT BUILD_MODE STREQUAL "--rapid" AND NOT BUILD_MODE STREQUAL "--debug" AND NOT BUILD_MODE STREQUAL "--release")
  message(FATAL_ERROR "Invalid build mode: ${BUILD_MODE}. Valid options are '--rapid', '--debug', '--release'")
else()
  message(STATUS "Building ${THIS_PROJECT_NAME} in ${BUILD_MODE} mode")
endif()

################################################################################
# INVOKE THE NITRATE BUILD TOOL
################################################################################
add_custom_target(
  ${THIS_PROJECT_NAME} # Set the target name
  ALL # Run this target everytime; Caching is the nitrate build tools job.
  COMMAND ${NITRATE_TOOL_EXE} build ${BUILD_MODE} ${PACKAGE_DIRECTORY} # Invoke the build tool
)
"#;

    content.replace("{{project_name}}", project_name)
}

/// The initial manifest, carrying the stock optimization profiles.
pub fn initial_manifest(options: &InitOptions) -> Manifest {
    use crate::package::{Optimization, OptimizationSwitch};

    let mut optimization = Optimization::default();
    optimization
        .set_profile(
            "rapid",
            OptimizationSwitch::uniform("-O0", "-O0", "-O0", "-O1", "-O0", "-O0"),
        )
        .set_profile(
            "debug",
            OptimizationSwitch::uniform("-O2", "-O2", "-O2", "-O3", "-O0", "-O1"),
        )
        .set_profile(
            "release",
            OptimizationSwitch::uniform("-O3", "-O3", "-O3", "-O3", "-O3", "-O3"),
        );

    Manifest::new(options.package_name.clone(), options.package_category)
        .with_description(options.package_description.clone())
        .with_license(options.package_license.clone())
        .with_version(options.package_version)
        .with_optimization(optimization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Version;

    fn options(name: &str, category: Category) -> InitOptions {
        InitOptions {
            package_name: name.to_string(),
            package_description: "An example package.".to_string(),
            package_license: "MIT".to_string(),
            package_version: Version::default(),
            package_category: category,
        }
    }

    #[test]
    fn test_name_helpers() {
        assert_eq!(github_username("@gh-jane/pkg"), Some("jane"));
        assert_eq!(github_username("@gl-jane/pkg"), None);
        assert_eq!(github_username("@std/core"), None);

        assert_eq!(package_tail("@gh-jane/my-pkg"), "my-pkg");
        assert_eq!(package_tail("@gh-jane/my-pkg:2"), "my-pkg");

        assert_eq!(beautify_name("my-cool-pkg"), "My Cool Pkg");
        assert_eq!(beautify_name("abc"), "Abc");
    }

    #[test]
    fn test_shields_io_escape() {
        assert_eq!(shields_io_escape("MIT"), "MIT");
        assert_eq!(shields_io_escape("LGPL-2.1"), "LGPL--2.1");
        assert_eq!(shields_io_escape("a b"), "a%20b");
    }

    #[test]
    fn test_security_policy_mentions_github_only_for_gh_packages() {
        let with_gh = security_policy("@gh-jane/my-pkg");
        assert!(with_gh.contains("https://github.com/jane/my-pkg/security/advisories/new"));
        assert!(with_gh.contains("(\"My Pkg\")"));
        assert!(!with_gh.contains("{{"));

        let without = security_policy("@gl-jane/my-pkg");
        assert!(!without.contains("github.com"));
        assert!(!without.contains("{{"));
    }

    #[test]
    fn test_readme_variants() {
        let exe = readme(&options("@gh-jane/my-pkg", Category::Executable));
        assert!(exe.contains("# My Pkg"));
        assert!(exe.contains("nitrate install https://github.com/jane/my-pkg"));
        assert!(exe.contains("license-MIT-"));
        assert!(!exe.contains("{{"));

        let std_lib = readme(&options("@std/core", Category::StandardLibrary));
        assert!(std_lib.contains("installed by default with the Nitrate toolchain"));

        let plain_lib = readme(&options("@gl-jane/my-pkg", Category::Library));
        assert!(plain_lib.contains("TODO: Write instructions"));
    }

    #[test]
    fn test_cmake_lists_embeds_project_name() {
        let text = cmake_lists("@gh-jane/my-pkg");
        assert!(text.contains("\"nitrate-my-pkg\""));
        assert!(!text.contains("{{"));
    }

    #[test]
    fn test_initial_manifest_is_schema_correct() {
        let manifest = initial_manifest(&options("@gh-jane/my-pkg", Category::Executable));
        let encoded = manifest.to_json(false);
        assert!(encoded.correct_schema);

        assert_eq!(
            manifest.optimization.rapid().llvm,
            std::collections::BTreeSet::from(["-O1".to_string()])
        );
        assert_eq!(
            manifest.optimization.release().lto,
            std::collections::BTreeSet::from(["-O3".to_string()])
        );
    }
}
