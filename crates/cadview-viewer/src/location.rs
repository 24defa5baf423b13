//! Shareable viewer state carried in the page's query string.
//!
//! `?model=<base name>&main=<hex>&accent=<hex>`, with colors written as six
//! lowercase hex digits and no leading `#`.

use url::form_urlencoded;

use cadview_ir::Rgb;

/// Viewer state reflected into the page location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerLocation {
    /// Selected model, by base file name without extension.
    pub model: Option<String>,
    /// Current main group color.
    pub main: Option<Rgb>,
    /// Current accent group color.
    pub accent: Option<Rgb>,
}

impl ViewerLocation {
    /// Parse a query string, with or without its leading `?`.
    ///
    /// Unknown keys and malformed colors are ignored.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut location = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "model" if !value.is_empty() => location.model = Some(value.into_owned()),
                "main" => location.main = parse_color(&value),
                "accent" => location.accent = parse_color(&value),
                _ => {}
            }
        }
        location
    }

    /// Encode as a query string with a leading `?`, or `""` when empty.
    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if let Some(model) = &self.model {
            serializer.append_pair("model", model);
        }
        if let Some(main) = self.main {
            serializer.append_pair("main", &main.to_hex_digits());
        }
        if let Some(accent) = self.accent {
            serializer.append_pair("accent", &accent.to_hex_digits());
        }
        let query = serializer.finish();
        if query.is_empty() {
            query
        } else {
            format!("?{query}")
        }
    }
}

fn parse_color(value: &str) -> Option<Rgb> {
    match Rgb::from_hex(value) {
        Ok(color) => Some(color),
        Err(err) => {
            log::debug!("ignoring location color {value:?}: {err}");
            None
        }
    }
}

/// URL of the color-group sidecar for a model URL.
///
/// The extension of the last path segment is replaced by `.colors.json`;
/// query and fragment are kept.
pub fn sidecar_url(model_url: &str) -> String {
    let split = model_url.find(['?', '#']).unwrap_or(model_url.len());
    let (path, rest) = model_url.split_at(split);
    let segment_start = path.rfind('/').map_or(0, |i| i + 1);
    let stem_end = path[segment_start..]
        .rfind('.')
        .filter(|&dot| dot > 0)
        .map_or(path.len(), |dot| segment_start + dot);
    format!("{}.colors.json{rest}", &path[..stem_end])
}
