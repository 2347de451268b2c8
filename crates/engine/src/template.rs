//! Request templating: turns a task's [`HttpRequest`] into a concrete
//! [`HttpCall`] by resolving every field against the contextual inputs.
//!
//! Resolution is per field and never recursive: a resolved value is used
//! as is, even if it looks like another key.

use transport::HttpCall;

use crate::models::HttpRequest;
use crate::repository::ContextualInputStore;

/// Resolve `request` for one activation of `workflow`/`instance`.
pub fn render(
    request: &HttpRequest,
    inputs: &ContextualInputStore,
    workflow: &str,
    instance: &str,
) -> HttpCall {
    let resolve = |value: &str| inputs.resolve(workflow, instance, value);

    let variables: Vec<String> = request.uri_variables.iter().map(|v| resolve(v)).collect();
    let mut call = HttpCall::new(request.method, expand_url(&request.url, &variables));

    call.headers = request
        .headers
        .iter()
        .map(|h| (h.name.clone(), resolve(&h.value)))
        .collect();
    call.query = request
        .params
        .iter()
        .map(|p| (p.name.clone(), resolve(&p.value)))
        .collect();
    call.body = request.body.as_deref().map(resolve);
    call
}

/// Fill `{...}` placeholders in `url` positionally from `variables`.
///
/// Placeholders past the last variable stay as written; extra variables are
/// ignored. An unterminated `{` is copied literally.
pub fn expand_url(url: &str, variables: &[String]) -> String {
    let mut out = String::with_capacity(url.len());
    let mut values = variables.iter();
    let mut rest = url;

    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        let placeholder = &rest[open..=open + len];
        match values.next() {
            Some(value) => out.push_str(value),
            None => out.push_str(placeholder),
        }
        rest = &rest[open + len + 1..];
    }
    out.push_str(rest);
    out
}
