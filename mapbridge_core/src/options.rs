// Copyright 2026 the Mapbridge Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Map, resource and client configuration records.
//!
//! All records deserialize with defaults for missing fields, so a host can
//! pass `{}` or a partial JSON object across the C ABI. Validation happens
//! once, when the map is constructed.

use serde::{Deserialize, Serialize};

use crate::error::ConstructionError;
use crate::surface::PhysicalSize;

/// How the map is driven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapMode {
    /// Interactive; renders continuously as content changes.
    #[default]
    Continuous,
    /// One still image per request.
    Static,
    /// One tile per request.
    Tile,
}

/// Which axes keep the world from scrolling out of view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstrainMode {
    /// No constraint.
    None,
    /// Latitude is clamped so the world fills the viewport height.
    #[default]
    HeightOnly,
    /// Both latitude and longitude are clamped.
    WidthAndHeight,
}

/// Orientation of the viewport's y axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewportMode {
    /// Y grows downward.
    #[default]
    Default,
    /// Y grows upward (for GL framebuffers read back without a flip).
    FlippedY,
}

/// Screen edge that north points toward at zero bearing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NorthOrientation {
    /// Top edge.
    #[default]
    Upwards,
    /// Right edge.
    Rightwards,
    /// Bottom edge.
    Downwards,
    /// Left edge.
    Leftwards,
}

impl NorthOrientation {
    /// Bearing offset in degrees this orientation adds.
    #[must_use]
    pub const fn angle(self) -> f64 {
        match self {
            Self::Upwards => 0.0,
            Self::Rightwards => 90.0,
            Self::Downwards => 180.0,
            Self::Leftwards => 270.0,
        }
    }
}

/// Options fixed for the lifetime of a map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    /// How the map is driven.
    pub map_mode: MapMode,
    /// Scroll constraint.
    pub constrain_mode: ConstrainMode,
    /// Y-axis orientation.
    pub viewport_mode: ViewportMode,
    /// Whether symbols from different sources collide with each other.
    pub cross_source_collisions: bool,
    /// Where north points at zero bearing.
    pub north_orientation: NorthOrientation,
    /// Initial size in physical pixels.
    pub size: PhysicalSize,
    /// Device pixel ratio.
    pub pixel_ratio: f32,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            map_mode: MapMode::Continuous,
            constrain_mode: ConstrainMode::HeightOnly,
            viewport_mode: ViewportMode::Default,
            cross_source_collisions: true,
            north_orientation: NorthOrientation::Upwards,
            size: PhysicalSize::new(64, 64),
            pixel_ratio: 1.0,
        }
    }
}

impl MapOptions {
    /// Sets the map mode.
    #[must_use]
    pub fn with_map_mode(mut self, mode: MapMode) -> Self {
        self.map_mode = mode;
        self
    }

    /// Sets the constrain mode.
    #[must_use]
    pub fn with_constrain_mode(mut self, mode: ConstrainMode) -> Self {
        self.constrain_mode = mode;
        self
    }

    /// Sets the viewport mode.
    #[must_use]
    pub fn with_viewport_mode(mut self, mode: ViewportMode) -> Self {
        self.viewport_mode = mode;
        self
    }

    /// Enables or disables cross-source symbol collisions.
    #[must_use]
    pub fn with_cross_source_collisions(mut self, enabled: bool) -> Self {
        self.cross_source_collisions = enabled;
        self
    }

    /// Sets the north orientation.
    #[must_use]
    pub fn with_north_orientation(mut self, orientation: NorthOrientation) -> Self {
        self.north_orientation = orientation;
        self
    }

    /// Sets the initial size.
    #[must_use]
    pub fn with_size(mut self, size: PhysicalSize) -> Self {
        self.size = size;
        self
    }

    /// Sets the pixel ratio.
    #[must_use]
    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        self.pixel_ratio = ratio;
        self
    }

    /// Checks the options.
    ///
    /// # Errors
    ///
    /// [`ConstructionError::InvalidOptions`] if the pixel ratio is not a
    /// positive finite number or the size is empty.
    pub fn validate(&self) -> Result<(), ConstructionError> {
        if !self.pixel_ratio.is_finite() || self.pixel_ratio <= 0.0 {
            return Err(ConstructionError::InvalidOptions(format!(
                "pixel_ratio must be positive, got {}",
                self.pixel_ratio
            )));
        }
        if self.size.is_empty() {
            return Err(ConstructionError::InvalidOptions(format!(
                "size must not be empty, got {}",
                self.size
            )));
        }
        Ok(())
    }
}

/// Endpoints and URL templates of a tile provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileServerOptions {
    /// Scheme and host every template is resolved against.
    pub base_url: String,
    /// Custom scheme (e.g. `maplibre://`) that expands to `base_url`.
    pub uri_scheme_alias: String,
    /// Query parameter carrying the API key.
    pub api_key_parameter_name: String,
    /// Whether requests fail without an API key.
    pub requires_api_key: bool,
    /// Source (`TileJSON`) template.
    pub source_template: String,
    /// Style template.
    pub style_template: String,
    /// Sprite template.
    pub sprites_template: String,
    /// Glyph template.
    pub glyphs_template: String,
    /// Tile template.
    pub tile_template: String,
    /// Style loaded when the host does not pick one.
    pub default_style: String,
}

impl Default for TileServerOptions {
    fn default() -> Self {
        Self::demo_tiles()
    }
}

impl TileServerOptions {
    /// The public `MapLibre` demo tile server. No API key needed.
    #[must_use]
    pub fn demo_tiles() -> Self {
        Self {
            base_url: "https://demotiles.maplibre.org".into(),
            uri_scheme_alias: "maplibre://".into(),
            api_key_parameter_name: String::new(),
            requires_api_key: false,
            source_template: "https://demotiles.maplibre.org".into(),
            style_template: "/style.json".into(),
            sprites_template: "/sprite".into(),
            glyphs_template: "/fonts/{fontstack}/{range}.pbf".into(),
            tile_template: "/tiles/{z}/{x}/{y}.pbf".into(),
            default_style: "https://demotiles.maplibre.org/style.json".into(),
        }
    }

    /// Mapbox. Requires an access token.
    #[must_use]
    pub fn mapbox() -> Self {
        Self {
            base_url: "https://api.mapbox.com".into(),
            uri_scheme_alias: "mapbox://".into(),
            api_key_parameter_name: "access_token".into(),
            requires_api_key: true,
            source_template: "https://api.mapbox.com".into(),
            style_template: "/styles/v1/{user}/{style}".into(),
            sprites_template: "/styles/v1/{user}/{style}/sprite".into(),
            glyphs_template: "/fonts/v1/{user}/{fontstack}/{range}.pbf".into(),
            tile_template: "/v4/{tileset}/{z}/{x}/{y}{ratio}.{format}".into(),
            default_style: String::new(),
        }
    }

    /// `MapTiler`. Requires an API key.
    #[must_use]
    pub fn maptiler() -> Self {
        Self {
            base_url: "https://api.maptiler.com".into(),
            uri_scheme_alias: "maptiler://".into(),
            api_key_parameter_name: "key".into(),
            requires_api_key: true,
            source_template: "https://api.maptiler.com".into(),
            style_template: "/maps/{style}/style.json".into(),
            sprites_template: "/maps/{style}/sprite".into(),
            glyphs_template: "/fonts/{fontstack}/{range}.pbf".into(),
            tile_template: "/tiles/{tileset}/{z}/{x}/{y}.pbf".into(),
            default_style: String::new(),
        }
    }
}

/// How the engine fetches and caches resources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceOptions {
    /// Key sent to providers that require one.
    pub api_key: String,
    /// Provider endpoints.
    pub tile_server: TileServerOptions,
    /// Directory of the offline cache. Empty disables it.
    pub cache_path: String,
    /// Root for `asset://` URLs.
    pub asset_path: String,
    /// Cache size limit in bytes.
    pub maximum_cache_size: u64,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            tile_server: TileServerOptions::demo_tiles(),
            cache_path: String::new(),
            asset_path: String::new(),
            maximum_cache_size: 50 * 1024 * 1024,
        }
    }
}

impl ResourceOptions {
    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// Sets the tile server.
    #[must_use]
    pub fn with_tile_server(mut self, tile_server: TileServerOptions) -> Self {
        self.tile_server = tile_server;
        self
    }

    /// Sets the cache directory.
    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<String>) -> Self {
        self.cache_path = path.into();
        self
    }

    /// Sets the asset root.
    #[must_use]
    pub fn with_asset_path(mut self, path: impl Into<String>) -> Self {
        self.asset_path = path.into();
        self
    }

    /// Sets the cache size limit.
    #[must_use]
    pub fn with_maximum_cache_size(mut self, bytes: u64) -> Self {
        self.maximum_cache_size = bytes;
        self
    }

    /// Checks the options.
    ///
    /// # Errors
    ///
    /// [`ConstructionError::InvalidOptions`] if the provider requires an API
    /// key and none is set.
    pub fn validate(&self) -> Result<(), ConstructionError> {
        if self.tile_server.requires_api_key && self.api_key.is_empty() {
            return Err(ConstructionError::InvalidOptions(format!(
                "{} requires an API key",
                self.tile_server.base_url
            )));
        }
        Ok(())
    }

    /// Expands the provider's scheme alias and appends the API key.
    ///
    /// `maplibre://style.json` becomes
    /// `https://demotiles.maplibre.org/style.json` with the demo preset.
    /// URLs with any other scheme are returned unchanged.
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        let server = &self.tile_server;
        let Some(rest) = (!server.uri_scheme_alias.is_empty())
            .then(|| url.strip_prefix(server.uri_scheme_alias.as_str()))
            .flatten()
        else {
            return url.to_string();
        };
        let mut resolved = format!("{}/{}", server.base_url.trim_end_matches('/'), rest);
        if !self.api_key.is_empty() && !server.api_key_parameter_name.is_empty() {
            let sep = if resolved.contains('?') { '&' } else { '?' };
            resolved = format!(
                "{resolved}{sep}{}={}",
                server.api_key_parameter_name, self.api_key
            );
        }
        resolved
    }
}

/// Identifies the embedding application to resource providers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            name: "mapbridge".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

impl ClientOptions {
    /// Creates client options.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// `name/version`, as sent in a `User-Agent` header.
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

/// Everything needed to build a map, in one JSON-friendly record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Map options.
    pub map: MapOptions,
    /// Resource options.
    pub resources: ResourceOptions,
    /// Client options.
    pub client: ClientOptions,
}

impl MapConfig {
    /// Parses a config from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// [`ConstructionError::InvalidOptions`] if the JSON is malformed or the
    /// result fails validation.
    pub fn from_json(json: &str) -> Result<Self, ConstructionError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConstructionError::InvalidOptions(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every record.
    ///
    /// # Errors
    ///
    /// The first [`ConstructionError::InvalidOptions`] found.
    pub fn validate(&self) -> Result<(), ConstructionError> {
        self.map.validate()?;
        self.resources.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let map = MapOptions::default();
        assert_eq!(map.map_mode, MapMode::Continuous, "continuous");
        assert_eq!(map.constrain_mode, ConstrainMode::HeightOnly, "height only");
        assert!(map.cross_source_collisions, "collisions on");
        assert_eq!(map.size, PhysicalSize::new(64, 64), "64x64");
        let res = ResourceOptions::default();
        assert_eq!(res.maximum_cache_size, 50 * 1024 * 1024, "50 MiB cache");
        assert_eq!(res.tile_server, TileServerOptions::demo_tiles(), "demo tiles");
    }

    #[test]
    fn invalid_map_options_are_rejected() {
        assert!(
            MapOptions::default().with_pixel_ratio(0.0).validate().is_err(),
            "zero pixel ratio"
        );
        assert!(
            MapOptions::default()
                .with_size(PhysicalSize::new(0, 10))
                .validate()
                .is_err(),
            "empty size"
        );
    }

    #[test]
    fn api_key_required_by_provider() {
        let opts = ResourceOptions::default().with_tile_server(TileServerOptions::mapbox());
        assert!(opts.validate().is_err(), "mapbox needs a token");
        assert!(
            opts.with_api_key("pk.test").validate().is_ok(),
            "token satisfies it"
        );
    }

    #[test]
    fn alias_urls_resolve() {
        let opts = ResourceOptions::default();
        assert_eq!(
            opts.resolve_url("maplibre://style.json"),
            "https://demotiles.maplibre.org/style.json",
            "alias expands"
        );
        assert_eq!(
            opts.resolve_url("file:///tmp/style.json"),
            "file:///tmp/style.json",
            "other schemes untouched"
        );
        let keyed = ResourceOptions::default()
            .with_tile_server(TileServerOptions::maptiler())
            .with_api_key("abc");
        assert_eq!(
            keyed.resolve_url("maptiler://maps/streets/style.json"),
            "https://api.maptiler.com/maps/streets/style.json?key=abc",
            "key appended"
        );
    }

    #[test]
    fn config_parses_partial_json() {
        let config = MapConfig::from_json(r#"{"map": {"pixel_ratio": 2.0}}"#).unwrap();
        assert!(
            (config.map.pixel_ratio - 2.0).abs() < f32::EPSILON,
            "pixel ratio read"
        );
        assert_eq!(config.client.name, "mapbridge", "client defaulted");
        assert!(
            MapConfig::from_json(r#"{"map": {"pixel_ratio": -1.0}}"#).is_err(),
            "validated after parsing"
        );
        assert!(MapConfig::from_json("not json").is_err(), "malformed");
    }
}
