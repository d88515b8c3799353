//! String rewriting for organization references embedded in package metadata.

use url::Url;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Replaces every occurrence of `from` with `to`, skipping matches that continue into a
/// longer organization or package name.
///
/// `https://github.com/acme` matches in `https://github.com/acme/widgets` and
/// `"https://github.com/acme"` but not in `https://github.com/acme-tools`.
///
/// # Example
///
/// ```
/// use ghmpkg_utils::rewrite::replace_org_reference;
///
/// let gemspec = "s.homepage = 'https://github.com/acme/tool'\ns.metadata = 'https://github.com/acme-labs'";
/// let updated = replace_org_reference(gemspec, "https://github.com/acme", "https://github.com/acme-new");
/// assert!(updated.contains("https://github.com/acme-new/tool"));
/// assert!(updated.contains("https://github.com/acme-labs"));
/// ```
pub fn replace_org_reference(content: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return content.to_string();
    }

    let mut result = String::with_capacity(content.len());
    let mut last = 0;
    for (idx, matched) in content.match_indices(from) {
        if idx < last {
            continue;
        }
        let end = idx + matched.len();
        let continues = content[end..].chars().next().is_some_and(is_name_char);
        if continues {
            continue;
        }
        result.push_str(&content[last..idx]);
        result.push_str(to);
        last = end;
    }
    result.push_str(&content[last..]);
    result
}

/// Replaces an npm scope prefix (`@from/` becomes `@to/`).
pub fn replace_npm_scope(content: &str, from: &str, to: &str) -> String {
    content.replace(&format!("@{from}/"), &format!("@{to}/"))
}

/// Rewrites the organization segment of an image source label.
///
/// When the label is a URL whose first path segment names `from` (case-insensitively),
/// only that segment is replaced. Otherwise the first standalone occurrence of `from`
/// is replaced.
pub fn rewrite_source_label(label: &str, from: &str, to: &str) -> String {
    if let Ok(mut url) = Url::parse(label) {
        let segments: Option<Vec<String>> = url
            .path_segments()
            .map(|s| s.map(str::to_string).collect());
        if let Some(mut segments) = segments {
            if segments
                .first()
                .is_some_and(|first| first.eq_ignore_ascii_case(from))
            {
                segments[0] = to.to_string();
                url.set_path(&format!("/{}", segments.join("/")));
                return url.to_string();
            }
        }
    }

    replace_first_org_reference(label, from, to)
}

fn replace_first_org_reference(content: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return content.to_string();
    }
    for (idx, matched) in content.match_indices(from) {
        let end = idx + matched.len();
        let starts_inside = content[..idx].chars().next_back().is_some_and(is_name_char);
        let continues = content[end..].chars().next().is_some_and(is_name_char);
        if !starts_inside && !continues {
            return format!("{}{}{}", &content[..idx], to, &content[end..]);
        }
    }
    content.to_string()
}
