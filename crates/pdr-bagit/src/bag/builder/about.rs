//! `about.txt`: a plain-text summary of the bag's dataset.

use super::finish::normalize_doi;
use super::BagBuilder;
use crate::bag::ABOUT_FILE;
use crate::error::{BagError, BagResult};
use crate::nerdm::{Record, NERDMD_FILENAME};
use serde_json::Value;
use std::fs;

const WIDTH: usize = 79;
const CONTACT_INDENT: &str = "         ";

impl BagBuilder {
    /// Write `about.txt` from the resource record and the POD record.
    ///
    /// Fails with a profile error when either record is missing. Fields
    /// absent from the resource record fall back to the POD record.
    pub fn write_about_file(&self) -> BagResult<()> {
        let nerd = self.root_record()?.ok_or_else(|| {
            BagError::profile(format!(
                "cannot write {}: missing resource-level {}",
                ABOUT_FILE, NERDMD_FILENAME
            ))
        })?;
        let pod = self.reader()?.read_pod()?.ok_or_else(|| {
            BagError::profile(format!("cannot write {}: missing POD record", ABOUT_FILE))
        })?;

        let text = render_about(&nerd, &pod, self.id.as_deref());
        fs::write(self.bagdir.join(ABOUT_FILE), text)?;
        let _guard = self.span.enter();
        tracing::debug!("wrote {}", ABOUT_FILE);
        Ok(())
    }
}

fn str_field<'a>(nerd: &'a Record, pod: &'a Record, key: &str) -> Option<&'a str> {
    nerd.get(key)
        .and_then(Value::as_str)
        .or_else(|| pod.get(key).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}

fn render_about(nerd: &Record, pod: &Record, id: Option<&str>) -> String {
    let mut lines: Vec<String> = vec![
        "This data collection is provided by the NIST Public Data Repository (PDR).".into(),
        String::new(),
    ];

    if let Some(title) = str_field(nerd, pod, "title") {
        lines.extend(wrap(title, WIDTH, ""));
        lines.push(String::new());
    }

    let authors = author_lines(nerd);
    if !authors.is_empty() {
        lines.extend(authors);
    }

    let doi = nerd.get("doi").and_then(Value::as_str).map(normalize_doi);
    let ark = id
        .map(String::from)
        .or_else(|| nerd.get("@id").and_then(Value::as_str).map(String::from));
    match (&doi, &ark) {
        (Some(doi), Some(ark)) => lines.push(format!("Identifier: {} ({})", doi, ark)),
        (Some(only), None) | (None, Some(only)) => lines.push(format!("Identifier: {}", only)),
        (None, None) => {}
    }
    lines.push(String::new());

    if let Some(contact) = contact_lines(nerd, pod) {
        lines.extend(contact);
        lines.push(String::new());
    }

    for para in description_paragraphs(nerd, pod) {
        lines.extend(wrap(&para, WIDTH, ""));
        lines.push(String::new());
    }

    let access = access_lines(nerd, pod);
    if !access.is_empty() {
        lines.extend(access);
        lines.push(String::new());
    }

    let links = info_links(nerd, pod, doi.as_deref());
    if !links.is_empty() {
        lines.push("More information:".into());
        lines.extend(links);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// DOI resolver link, landing page, then each reference's location.
fn info_links(nerd: &Record, pod: &Record, doi: Option<&str>) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let mut push = |link: &str| {
        let link = link.trim();
        if !link.is_empty() && !links.iter().any(|l| l == link) {
            links.push(link.to_string());
        }
    };

    if let Some(doi) = doi {
        push(&format!("https://doi.org/{}", doi.trim_start_matches("doi:")));
    }
    if let Some(landing) = str_field(nerd, pod, "landingPage") {
        push(landing);
    }
    let refs = nerd.get("references").and_then(Value::as_array);
    for reference in refs.into_iter().flatten() {
        if let Some(loc) = reference.get("location").and_then(Value::as_str) {
            push(loc);
        }
    }
    links
}

/// "A [1], B [2] and C [1]" followed by the numbered affiliations.
fn author_lines(nerd: &Record) -> Vec<String> {
    let Some(authors) = nerd.get("authors").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut affils: Vec<String> = Vec::new();
    let mut names: Vec<String> = Vec::new();
    for author in authors {
        let Some(name) = author
            .get("fn")
            .and_then(Value::as_str)
            .or_else(|| author.get("familyName").and_then(Value::as_str))
        else {
            continue;
        };
        let mut refs = Vec::new();
        for affil in author
            .get("affiliation")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let Some(title) = affil.get("title").and_then(Value::as_str) else {
                continue;
            };
            let idx = match affils.iter().position(|a| a == title) {
                Some(i) => i,
                None => {
                    affils.push(title.to_string());
                    affils.len() - 1
                }
            };
            refs.push(format!("[{}]", idx + 1));
        }
        if refs.is_empty() {
            names.push(name.to_string());
        } else {
            names.push(format!("{} {}", name, refs.join("")));
        }
    }
    if names.is_empty() {
        return Vec::new();
    }

    let joined = match names.as_slice() {
        [one] => one.clone(),
        [first, second] => format!("{} and {}", first, second),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
        [] => String::new(),
    };
    let mut lines = wrap(&joined, WIDTH, "");
    for (i, affil) in affils.iter().enumerate() {
        lines.extend(wrap(&format!("[{}] {}", i + 1, affil), WIDTH, "    "));
    }
    lines
}

fn contact_lines(nerd: &Record, pod: &Record) -> Option<Vec<String>> {
    let cp = nerd
        .get("contactPoint")
        .or_else(|| pod.get("contactPoint"))?
        .as_object()?;
    let name = cp.get("fn").and_then(Value::as_str)?;

    let mut first = format!("Contact: {}", name);
    if let Some(email) = cp.get("hasEmail").and_then(Value::as_str) {
        first.push_str(&format!(" ({})", email.trim_start_matches("mailto:")));
    }
    let mut lines = vec![first];
    for line in cp
        .get("postalAddress")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
    {
        lines.push(format!("{}{}", CONTACT_INDENT, line));
    }
    if let Some(phone) = cp.get("phoneNumber").and_then(Value::as_str) {
        lines.push(format!("{}Phone: {}", CONTACT_INDENT, phone));
    }
    Some(lines)
}

fn description_paragraphs(nerd: &Record, pod: &Record) -> Vec<String> {
    let desc = nerd.get("description").or_else(|| pod.get("description"));
    let paras: Vec<String> = match desc {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        Some(Value::String(s)) => s.split("\n\n").map(String::from).collect(),
        _ => Vec::new(),
    };
    paras
        .into_iter()
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect()
}

fn access_lines(nerd: &Record, pod: &Record) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(level) = str_field(nerd, pod, "accessLevel") {
        lines.push(format!("Access level: {}", level));
    }
    if let Some(rights) = str_field(nerd, pod, "rights") {
        lines.extend(wrap(&format!("Rights: {}", rights), WIDTH, "  "));
    }
    if let Some(license) = str_field(nerd, pod, "license") {
        lines.push(format!("License: {}", license));
    }
    lines
}

/// Greedy word wrap; continuation lines get `indent`.
fn wrap(text: &str, width: usize, indent: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        if cur.is_empty() {
            if !lines.is_empty() {
                cur.push_str(indent);
            }
            cur.push_str(word);
        } else if cur.len() + 1 + word.len() <= width {
            cur.push(' ');
            cur.push_str(word);
        } else {
            lines.push(std::mem::take(&mut cur));
            cur.push_str(indent);
            cur.push_str(word);
        }
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_wrap() {
        let lines = wrap(&"lorem ipsum ".repeat(20), 40, "  ");
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.len() <= 40));
        assert!(lines[1].starts_with("  lorem"));
        assert!(wrap("", 40, "").is_empty());
    }

    #[test]
    fn test_author_lines_number_shared_affiliations() {
        let nerd = record(json!({
            "authors": [
                {"fn": "Alice", "affiliation": [{"title": "NIST"}]},
                {"fn": "Bob", "affiliation": [{"title": "NIST"}]},
            ]
        }));
        assert_eq!(author_lines(&nerd), vec!["Alice [1] and Bob [1]", "[1] NIST"]);

        let nerd = record(json!({
            "authors": [
                {"fn": "A", "affiliation": [{"title": "X"}]},
                {"fn": "B", "affiliation": [{"title": "Y"}]},
                {"fn": "C"},
            ]
        }));
        assert_eq!(author_lines(&nerd)[0], "A [1], B [2] and C");
    }

    #[test]
    fn test_render_about_falls_back_to_pod() {
        let nerd = record(json!({"@id": "ark:/88434/mds00nbc5c"}));
        let pod = record(json!({
            "title": "Pod Title",
            "description": "First para.\n\nSecond para.",
            "contactPoint": {"fn": "Pat Doe", "hasEmail": "mailto:pat@nist.gov"},
        }));
        let text = render_about(&nerd, &pod, None);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("NIST Public Data"));
        assert_eq!(lines[2], "Pod Title");
        assert!(lines.contains(&"Identifier: ark:/88434/mds00nbc5c"));
        assert!(lines.contains(&"Contact: Pat Doe (pat@nist.gov)"));
        assert!(lines.contains(&"First para."));
        assert!(lines.contains(&"Second para."));
        assert_eq!(*lines.last().unwrap(), "Second para.");
        assert!(!text.contains("More information:"));
        assert!(text.ends_with("Second para.\n"));
    }

    #[test]
    fn test_render_about_lists_references() {
        let nerd = record(json!({
            "@id": "ark:/88434/mds00nbc5c",
            "title": "Title",
            "doi": "doi:10.18434/M3XY12",
            "landingPage": "https://data.nist.gov/pdr/lps/mds00nbc5c",
            "references": [
                {"@type": ["deo:BibliographicReference"], "location": "https://doi.org/10.1/paper"},
                {"@type": ["deo:BibliographicReference"], "title": "no location"},
                {"location": "https://data.nist.gov/pdr/lps/mds00nbc5c"},
                {"location": "https://example.gov/manual.pdf"},
            ]
        }));
        let text = render_about(&nerd, &Record::new(), None);
        let lines: Vec<&str> = text.lines().collect();
        let at = lines.iter().position(|l| *l == "More information:").unwrap();
        assert_eq!(
            &lines[at + 1..],
            &[
                "https://doi.org/10.18434/M3XY12",
                "https://data.nist.gov/pdr/lps/mds00nbc5c",
                "https://doi.org/10.1/paper",
                "https://example.gov/manual.pdf",
            ]
        );
    }
}
