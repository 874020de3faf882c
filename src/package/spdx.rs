//! Built-in SPDX license identifier table and license text retrieval.
//!
//! Identifier matching is case-insensitive: the table maps the lowercased
//! identifier to its canonical SPDX spelling.

use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// (lowercase, canonical) pairs for the SPDX identifiers the toolchain
/// recognizes. Kept sorted by the lowercase key.
static SPDX_IDENTIFIERS: &[(&str, &str)] = &[
    ("0bsd", "0BSD"),
    ("afl-3.0", "AFL-3.0"),
    ("agpl-1.0-only", "AGPL-1.0-only"),
    ("agpl-1.0-or-later", "AGPL-1.0-or-later"),
    ("agpl-3.0-only", "AGPL-3.0-only"),
    ("agpl-3.0-or-later", "AGPL-3.0-or-later"),
    ("apache-1.0", "Apache-1.0"),
    ("apache-1.1", "Apache-1.1"),
    ("apache-2.0", "Apache-2.0"),
    ("apsl-2.0", "APSL-2.0"),
    ("artistic-1.0", "Artistic-1.0"),
    ("artistic-2.0", "Artistic-2.0"),
    ("blueoak-1.0.0", "BlueOak-1.0.0"),
    ("bsd-1-clause", "BSD-1-Clause"),
    ("bsd-2-clause", "BSD-2-Clause"),
    ("bsd-2-clause-patent", "BSD-2-Clause-Patent"),
    ("bsd-3-clause", "BSD-3-Clause"),
    ("bsd-3-clause-attribution", "BSD-3-Clause-Attribution"),
    ("bsd-3-clause-clear", "BSD-3-Clause-Clear"),
    ("bsd-4-clause", "BSD-4-Clause"),
    ("bsl-1.0", "BSL-1.0"),
    ("cal-1.0", "CAL-1.0"),
    ("cc-by-1.0", "CC-BY-1.0"),
    ("cc-by-2.0", "CC-BY-2.0"),
    ("cc-by-3.0", "CC-BY-3.0"),
    ("cc-by-4.0", "CC-BY-4.0"),
    ("cc-by-nc-4.0", "CC-BY-NC-4.0"),
    ("cc-by-nc-nd-4.0", "CC-BY-NC-ND-4.0"),
    ("cc-by-nc-sa-4.0", "CC-BY-NC-SA-4.0"),
    ("cc-by-nd-4.0", "CC-BY-ND-4.0"),
    ("cc-by-sa-3.0", "CC-BY-SA-3.0"),
    ("cc-by-sa-4.0", "CC-BY-SA-4.0"),
    ("cc-pddc", "CC-PDDC"),
    ("cc0-1.0", "CC0-1.0"),
    ("cddl-1.0", "CDDL-1.0"),
    ("cddl-1.1", "CDDL-1.1"),
    ("cecill-2.1", "CECILL-2.1"),
    ("cecill-b", "CECILL-B"),
    ("cecill-c", "CECILL-C"),
    ("cpl-1.0", "CPL-1.0"),
    ("ecl-2.0", "ECL-2.0"),
    ("efl-2.0", "EFL-2.0"),
    ("epl-1.0", "EPL-1.0"),
    ("epl-2.0", "EPL-2.0"),
    ("eupl-1.1", "EUPL-1.1"),
    ("eupl-1.2", "EUPL-1.2"),
    ("fsfap", "FSFAP"),
    ("gfdl-1.3-only", "GFDL-1.3-only"),
    ("gfdl-1.3-or-later", "GFDL-1.3-or-later"),
    ("gpl-1.0-only", "GPL-1.0-only"),
    ("gpl-1.0-or-later", "GPL-1.0-or-later"),
    ("gpl-2.0-only", "GPL-2.0-only"),
    ("gpl-2.0-or-later", "GPL-2.0-or-later"),
    ("gpl-3.0-only", "GPL-3.0-only"),
    ("gpl-3.0-or-later", "GPL-3.0-or-later"),
    ("hpnd", "HPND"),
    ("icu", "ICU"),
    ("ijg", "IJG"),
    ("isc", "ISC"),
    ("lgpl-2.0-only", "LGPL-2.0-only"),
    ("lgpl-2.0-or-later", "LGPL-2.0-or-later"),
    ("lgpl-2.1", "LGPL-2.1"),
    ("lgpl-2.1-only", "LGPL-2.1-only"),
    ("lgpl-2.1-or-later", "LGPL-2.1-or-later"),
    ("lgpl-3.0-only", "LGPL-3.0-only"),
    ("lgpl-3.0-or-later", "LGPL-3.0-or-later"),
    ("libpng", "Libpng"),
    ("libpng-2.0", "libpng-2.0"),
    ("mit", "MIT"),
    ("mit-0", "MIT-0"),
    ("mit-advertising", "MIT-advertising"),
    ("mit-cmu", "MIT-CMU"),
    ("mit-enna", "MIT-enna"),
    ("mit-modern-variant", "MIT-Modern-Variant"),
    ("mpl-1.0", "MPL-1.0"),
    ("mpl-1.1", "MPL-1.1"),
    ("mpl-2.0", "MPL-2.0"),
    ("ms-pl", "MS-PL"),
    ("ms-rl", "MS-RL"),
    ("mulanpsl-2.0", "MulanPSL-2.0"),
    ("ncsa", "NCSA"),
    ("ofl-1.1", "OFL-1.1"),
    ("openssl", "OpenSSL"),
    ("osl-3.0", "OSL-3.0"),
    ("php-3.01", "PHP-3.01"),
    ("postgresql", "PostgreSQL"),
    ("python-2.0", "Python-2.0"),
    ("qpl-1.0", "QPL-1.0"),
    ("ruby", "Ruby"),
    ("sgi-b-2.0", "SGI-B-2.0"),
    ("sleepycat", "Sleepycat"),
    ("ssh-openssh", "SSH-OpenSSH"),
    ("ssh-short", "SSH-short"),
    ("sspl-1.0", "SSPL-1.0"),
    ("sunpro", "SunPro"),
    ("unicode-dfs-2016", "Unicode-DFS-2016"),
    ("unlicense", "Unlicense"),
    ("upl-1.0", "UPL-1.0"),
    ("vim", "Vim"),
    ("w3c", "W3C"),
    ("wtfpl", "WTFPL"),
    ("x11", "X11"),
    ("zlib", "Zlib"),
    ("zpl-2.1", "ZPL-2.1"),
];

static SPDX_TABLE: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| SPDX_IDENTIFIERS.iter().copied().collect());

/// Case-insensitive exact membership test against the identifier table.
pub fn is_exact_spdx_license_match(query: &str) -> bool {
    SPDX_TABLE.contains_key(query.to_ascii_lowercase().as_str())
}

/// Resolve a (possibly miscased) identifier to its canonical spelling.
pub fn canonical_spdx_license(query: &str) -> Option<&'static str> {
    SPDX_TABLE.get(query.to_ascii_lowercase().as_str()).copied()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            cur[j + 1] = substitution.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[b.len()]
}

/// Find the identifier with the smallest edit distance to `query`. Used to
/// suggest a correction when license validation rejects the user's input.
pub fn find_closest_spdx_license(query: &str) -> &'static str {
    let query = query.to_ascii_lowercase();

    let mut best = SPDX_IDENTIFIERS[0].1;
    let mut best_distance = usize::MAX;

    for (lowercase, canonical) in SPDX_IDENTIFIERS {
        let distance = levenshtein(lowercase, &query);
        if distance < best_distance {
            best_distance = distance;
            best = canonical;
        }
    }

    best
}

fn license_text_endpoint(spdx_id: &str) -> String {
    format!("https://scancode-licensedb.aboutcode.org/{spdx_id}.json")
}

/// Fetch the full license text for an identifier from the license database.
///
/// Returns None if the identifier is unknown, the request fails, or the
/// response is not in the expected shape.
pub fn get_spdx_license_text(query: &str) -> Option<String> {
    let name = query.to_ascii_lowercase();

    trace!("Looking up SPDX license text for identifier: {name}");

    if !is_exact_spdx_license_match(&name) {
        trace!("Identifier is not an exact SPDX match: {name}");
        return None;
    }

    let endpoint = license_text_endpoint(&name);
    let response = match reqwest::blocking::Client::builder()
        .user_agent("nitrate:init/1.0")
        .build()
        .and_then(|client| client.get(&endpoint).send())
    {
        Ok(response) => response,
        Err(e) => {
            debug!("License text request to {endpoint} failed: {e}");
            return None;
        }
    };

    let body: serde_json::Value = match response.json() {
        Ok(body) => body,
        Err(e) => {
            debug!("License database returned malformed JSON for {name}: {e}");
            return None;
        }
    };

    let text = body.get("text")?.as_str()?;

    trace!("Retrieved SPDX license text for identifier: {name}");

    Some(format!("{text}\n"))
}
