use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Field copied verbatim: absent stays absent, a present value (`null` included) is kept.
pub type Passthrough = Option<Value>;

fn keep_present<'de, D: Deserializer<'de>>(d: D) -> Result<Passthrough, D::Error> { Value::deserialize(d).map(Some) }

// --- Raw scene objects, as embedded by the sites ---

/// A work exactly as a page embeds it: every asset reference is absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWork {
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub initial: Passthrough,
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub observers: Passthrough,
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub title_picture_url: Passthrough,
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub picture_url: Passthrough,
    pub panorama: RawPanorama,
    pub model: RawModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPanorama {
    pub list: Vec<RawPanoramaNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPanoramaNode {
    pub back: String,
    pub front: String,
    pub left: String,
    pub right: String,
    pub up: String,
    pub down: String,
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub derived_id: Passthrough,
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub index: Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawModel {
    pub file_url: String,
    pub material_base_url: String,
    #[serde(default)]
    pub material_textures: Vec<String>,
    #[serde(rename = "type", default)]
    pub model_type: Value,
}

// --- Canonical manifest ---

/// Portable manifest of a scene: one base URL plus base-relative paths.
///
/// `base_url + path` gives back the absolute URL of every panorama face, the
/// model file and the material base. Textures are one level deeper: they are
/// relative to the absolute material base, `base_url + model.material_base_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkDescriptor {
    pub base_url: String,
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub initial: Passthrough,
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub observers: Passthrough,
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub title_picture_url: Passthrough,
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub picture_url: Passthrough,
    pub panorama: Panorama,
    pub model: Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panorama {
    pub list: Vec<PanoramaNode>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanoramaNode {
    pub back: String,
    pub front: String,
    pub left: String,
    pub right: String,
    pub up: String,
    pub down: String,
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub derived_id: Passthrough,
    #[serde(default, deserialize_with = "keep_present", skip_serializing_if = "Option::is_none")]
    pub index: Passthrough,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub file_url: String,
    pub material_textures: Vec<String>,
    pub material_base_url: String,
    #[serde(rename = "type", default)]
    pub model_type: Value,
}

/// One file the download layer has to fetch for a work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAsset {
    pub url: String,
    /// Destination, relative to the task directory.
    pub path: String,
}

impl PlannedAsset {
    fn new(url: String, path: impl Into<String>) -> Self { Self { url, path: path.into() } }
}

impl PanoramaNode {
    /// The six faces in download order.
    pub fn faces(&self) -> [&str; 6] {
        [
            self.right.as_str(),
            self.left.as_str(),
            self.front.as_str(),
            self.back.as_str(),
            self.up.as_str(),
            self.down.as_str(),
        ]
    }
}

impl WorkDescriptor {
    pub fn absolute_url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

    pub fn absolute_material_base(&self) -> String { self.absolute_url(&self.model.material_base_url) }

    pub fn absolute_texture_url(&self, texture: &str) -> String {
        format!("{}{}", self.absolute_material_base(), texture)
    }

    /// Every asset of the work with its destination path.
    pub fn download_plan(&self) -> Vec<PlannedAsset> {
        let mut plan = Vec::with_capacity(3 + self.panorama.list.len() * 6 + self.model.material_textures.len());
        // cover pictures are optional in page data
        for (field, path) in [(&self.picture_url, "picture.jpg"), (&self.title_picture_url, "title_picture.jpg")] {
            if let Some(url) = field.as_ref().and_then(Value::as_str).filter(|u| !u.is_empty()) {
                plan.push(PlannedAsset::new(url.to_string(), path));
            }
        }
        for node in &self.panorama.list {
            for face in node.faces() {
                plan.push(PlannedAsset::new(self.absolute_url(face), face));
            }
        }
        plan.push(PlannedAsset::new(self.absolute_url(&self.model.file_url), self.model.file_url.clone()));
        for texture in &self.model.material_textures {
            plan.push(PlannedAsset::new(
                self.absolute_texture_url(texture),
                format!("{}{}", self.model.material_base_url, texture),
            ));
        }
        plan
    }
}
