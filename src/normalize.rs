use crate::error::NormalizeError;
use crate::types::{Model, Panorama, PanoramaNode, RawModel, RawPanoramaNode, RawWork, WorkDescriptor};

/// Path segment that starts the asset tree under the shared base URL.
pub const BASE_TOKEN: &str = "images";

/// Rewrite every asset reference of `raw` relative to its base.
pub fn normalize(raw: RawWork) -> Result<WorkDescriptor, NormalizeError> {
    let base_url = base_url(&raw)?;
    let list = raw
        .panorama
        .list
        .into_iter()
        .enumerate()
        .map(|(i, node)| relativize_node(i, node, &base_url))
        .collect::<Result<Vec<_>, _>>()?;
    let model = relativize_model(raw.model, &base_url)?;
    Ok(WorkDescriptor {
        initial: raw.initial,
        observers: raw.observers,
        title_picture_url: raw.title_picture_url,
        picture_url: raw.picture_url,
        panorama: Panorama { count: list.len(), list },
        model,
        base_url,
    })
}

/// Everything before the first `images` segment of the first panorama's back face.
pub fn base_url(raw: &RawWork) -> Result<String, NormalizeError> {
    let first = raw.panorama.list.first().ok_or(NormalizeError::NoPanorama)?;
    let cut = first
        .back
        .find(BASE_TOKEN)
        .ok_or_else(|| NormalizeError::MissingBaseToken(first.back.clone()))?;
    Ok(first.back[..cut].to_string())
}

/// Remove exactly `base` from the front of `url`. The base is never searched
/// for again inside the url; a url that does not start with it is an error.
pub fn strip_base(field: &str, url: &str, base: &str) -> Result<String, NormalizeError> {
    url.strip_prefix(base)
        .map(str::to_string)
        .ok_or_else(|| NormalizeError::PrefixMismatch {
            field: field.to_string(),
            base: base.to_string(),
            url: url.to_string(),
        })
}

fn relativize_node(i: usize, node: RawPanoramaNode, base: &str) -> Result<PanoramaNode, NormalizeError> {
    let face = |name: &str, url: &str| strip_base(&format!("panorama.list[{i}].{name}"), url, base);
    Ok(PanoramaNode {
        back: face("back", &node.back)?,
        front: face("front", &node.front)?,
        left: face("left", &node.left)?,
        right: face("right", &node.right)?,
        up: face("up", &node.up)?,
        down: face("down", &node.down)?,
        derived_id: node.derived_id,
        index: node.index,
    })
}

fn relativize_model(model: RawModel, base: &str) -> Result<Model, NormalizeError> {
    // textures hang off the absolute material base, not the work base
    let material_textures = model
        .material_textures
        .iter()
        .enumerate()
        .map(|(i, t)| strip_base(&format!("model.material_textures[{i}]"), t, &model.material_base_url))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Model {
        file_url: strip_base("model.file_url", &model.file_url, base)?,
        material_base_url: strip_base("model.material_base_url", &model.material_base_url, base)?,
        material_textures,
        model_type: model.model_type,
    })
}
