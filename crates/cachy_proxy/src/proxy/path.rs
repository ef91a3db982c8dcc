/// Prefixes the origin base path to an inbound path-and-query.
///
/// - An empty or `/` base leaves the request untouched
/// - A trailing `/` on the base is not doubled
/// - The result always starts with `/`
pub(super) fn prefix_path(base_path: &str, path_and_query: &str) -> String {
    let base = base_path.trim_end_matches('/');

    if path_and_query.starts_with('/') {
        format!("{base}{path_and_query}")
    } else {
        format!("{base}/{path_and_query}")
    }
}
