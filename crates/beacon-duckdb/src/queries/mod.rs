pub mod events;
pub mod overview;
pub mod realtime;
pub mod timeseries;
pub mod top_pages;

use beacon_core::analytics::ReportScope;

/// Build the `column`-scoping predicate for an organization-scoped query,
/// optionally narrowed to one website. Parameters are pushed in placeholder
/// order; `param_idx` tracks the next `?N`.
pub(crate) fn scope_predicate(
    scope: &ReportScope,
    column: &str,
    params: &mut Vec<Box<dyn duckdb::types::ToSql>>,
    param_idx: &mut usize,
) -> String {
    let mut sql = format!(
        "{column} IN (SELECT id FROM websites WHERE organization_id = ?{})",
        param_idx
    );
    params.push(Box::new(scope.organization_id.clone()));
    *param_idx += 1;

    if let Some(ref website_id) = scope.website_id {
        sql.push_str(&format!(" AND {column} = ?{}", param_idx));
        params.push(Box::new(website_id.clone()));
        *param_idx += 1;
    }
    sql
}

pub(crate) fn param_refs(
    params: &[Box<dyn duckdb::types::ToSql>],
) -> Vec<&dyn duckdb::types::ToSql> {
    params.iter().map(|p| p.as_ref()).collect()
}
