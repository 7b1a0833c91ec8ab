// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The subset of a style document the headless engine understands.
//!
//! Only the structure is checked: version 8, a `sources` object and a
//! `layers` array. Layer paint and layout are opaque except for the
//! background colour and `icon-image` references.

use mapbridge_core::LatLng;
use serde_json::{Map as JsonObject, Value};
use thiserror::Error;

use crate::backend::Rgba8;

/// A style document failed validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid style: {0}")]
pub struct StyleError(pub String);

/// One style layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    /// Layer id.
    pub id: String,
    /// Layer type (`background`, `fill`, `symbol`, …).
    pub kind: String,
    /// Image referenced by `layout.icon-image`, if any.
    pub icon_image: Option<String>,
}

/// A parsed style.
#[derive(Clone, Debug, PartialEq)]
pub struct Style {
    /// Style name.
    pub name: Option<String>,
    /// Default camera center.
    pub center: Option<LatLng>,
    /// Default zoom.
    pub zoom: Option<f64>,
    /// Default bearing.
    pub bearing: Option<f64>,
    /// Default pitch.
    pub pitch: Option<f64>,
    /// Source ids, sorted by name.
    pub sources: Vec<String>,
    /// Layers, bottom to top.
    pub layers: Vec<Layer>,
    /// Images the style provides, when it declares them.
    pub images: Option<Vec<String>>,
    /// Clear colour from the first `background` layer.
    pub background: Rgba8,
}

impl Style {
    /// Parses and validates a style document.
    ///
    /// # Errors
    ///
    /// [`StyleError`] if the document is not JSON or lacks the required
    /// structure.
    pub fn parse(json: &str) -> Result<Self, StyleError> {
        let doc: Value =
            serde_json::from_str(json).map_err(|err| StyleError(err.to_string()))?;
        let Some(doc) = doc.as_object() else {
            return Err(StyleError("style must be a JSON object".into()));
        };
        match doc.get("version").and_then(Value::as_u64) {
            Some(8) => {}
            other => {
                return Err(StyleError(format!(
                    "unsupported style version {other:?}, expected 8"
                )));
            }
        }
        let sources = doc
            .get("sources")
            .and_then(Value::as_object)
            .ok_or_else(|| StyleError("`sources` must be an object".into()))?
            .keys()
            .cloned()
            .collect();
        let layers = doc
            .get("layers")
            .and_then(Value::as_array)
            .ok_or_else(|| StyleError("`layers` must be an array".into()))?
            .iter()
            .enumerate()
            .map(|(i, layer)| parse_layer(i, layer))
            .collect::<Result<Vec<_>, _>>()?;
        let background = doc
            .get("layers")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|layer| layer.get("type").and_then(Value::as_str) == Some("background"))
            .and_then(|layer| layer.pointer("/paint/background-color"))
            .and_then(Value::as_str)
            .and_then(parse_color)
            .unwrap_or(Rgba8::WHITE);

        Ok(Self {
            name: doc.get("name").and_then(Value::as_str).map(str::to_owned),
            center: parse_center(doc),
            zoom: doc.get("zoom").and_then(Value::as_f64),
            bearing: doc.get("bearing").and_then(Value::as_f64),
            pitch: doc.get("pitch").and_then(Value::as_f64),
            sources,
            layers,
            images: doc.get("images").and_then(Value::as_array).map(|images| {
                images
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            }),
            background,
        })
    }

    /// `icon-image` references with no matching entry in `images`, in layer
    /// order without duplicates. Empty when the style declares no images.
    #[must_use]
    pub fn missing_images(&self) -> Vec<String> {
        let Some(images) = &self.images else {
            return Vec::new();
        };
        let mut missing: Vec<String> = Vec::new();
        for icon in self.layers.iter().filter_map(|l| l.icon_image.as_ref()) {
            if !images.contains(icon) && !missing.contains(icon) {
                missing.push(icon.clone());
            }
        }
        missing
    }
}

fn parse_layer(index: usize, layer: &Value) -> Result<Layer, StyleError> {
    let field = |name: &str| {
        layer
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| StyleError(format!("layer {index} has no `{name}`")))
    };
    Ok(Layer {
        id: field("id")?,
        kind: field("type")?,
        icon_image: layer
            .pointer("/layout/icon-image")
            .and_then(Value::as_str)
            .map(str::to_owned),
    })
}

// Style centers are `[longitude, latitude]`.
fn parse_center(doc: &JsonObject<String, Value>) -> Option<LatLng> {
    match doc.get("center")?.as_array()?.as_slice() {
        [lng, lat] => Some(LatLng::new(lat.as_f64()?, lng.as_f64()?)),
        _ => None,
    }
}

/// Parses `#rgb` and `#rrggbb` colours.
fn parse_color(s: &str) -> Option<Rgba8> {
    let hex = s.strip_prefix('#')?;
    let channel = |i: usize, len: usize| {
        let v = u8::from_str_radix(hex.get(i * len..(i + 1) * len)?, 16).ok()?;
        Some(if len == 1 { v * 17 } else { v })
    };
    let len = match hex.len() {
        3 => 1,
        6 => 2,
        _ => return None,
    };
    Some(Rgba8::new(channel(0, len)?, channel(1, len)?, channel(2, len)?, 255))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLE: &str = r##"{
        "version": 8,
        "name": "Demo",
        "center": [13.4, 52.5],
        "zoom": 9,
        "sources": {"osm": {"type": "vector"}, "dem": {"type": "raster-dem"}},
        "images": ["pin"],
        "layers": [
            {"id": "bg", "type": "background", "paint": {"background-color": "#336699"}},
            {"id": "pois", "type": "symbol", "layout": {"icon-image": "cafe"}},
            {"id": "pins", "type": "symbol", "layout": {"icon-image": "pin"}}
        ]
    }"##;

    #[test]
    fn parses_defaults_and_structure() {
        let style = Style::parse(STYLE).unwrap();
        assert_eq!(style.name.as_deref(), Some("Demo"), "name");
        assert_eq!(style.center, Some(LatLng::new(52.5, 13.4)), "lng/lat order");
        assert_eq!(style.zoom, Some(9.0), "zoom");
        assert_eq!(style.bearing, None, "bearing absent");
        assert_eq!(style.sources.len(), 2, "two sources");
        assert_eq!(style.layers.len(), 3, "three layers");
        assert_eq!(style.background, Rgba8::new(0x33, 0x66, 0x99, 255), "bg");
    }

    #[test]
    fn reports_missing_images() {
        let style = Style::parse(STYLE).unwrap();
        assert_eq!(style.missing_images(), vec!["cafe".to_owned()], "pin exists");
    }

    #[test]
    fn rejects_malformed_documents() {
        for (doc, why) in [
            ("not json", "syntax"),
            ("[]", "not an object"),
            (r#"{"version": 7, "sources": {}, "layers": []}"#, "version"),
            (r#"{"version": 8, "layers": []}"#, "no sources"),
            (r#"{"version": 8, "sources": {}, "layers": {}}"#, "layers not array"),
            (r#"{"version": 8, "sources": {}, "layers": [{"id": "x"}]}"#, "no type"),
        ] {
            assert!(Style::parse(doc).is_err(), "{why}");
        }
    }

    #[test]
    fn short_colors_expand() {
        assert_eq!(parse_color("#fff"), Some(Rgba8::WHITE), "short form");
        assert_eq!(parse_color("blue"), None, "names unsupported");
    }
}
