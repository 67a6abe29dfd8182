use serde::Deserialize;
use serde_json::Value;

use crate::error::ResolveError;
use crate::types::RawWork;
use crate::variant::SiteVariant;

/// What a located payload turned out to be.
#[derive(Debug, Clone)]
pub enum SceneSource {
    /// The page embedded the work itself.
    Embedded(Box<RawWork>),
    /// The page only embedded a query; the work comes from the init-data endpoint.
    InitQuery(Value),
}

#[derive(Deserialize)]
struct ModuleData {
    work: RawWork,
}

#[derive(Deserialize)]
struct HouseInfo {
    firstscreen: FirstScreen,
}

#[derive(Deserialize)]
struct FirstScreen {
    #[serde(rename = "defaultWork")]
    default_work: RawWork,
}

/// Decode a located payload. Malformed JSON, or an envelope missing its work,
/// is a parse failure; nothing partial is ever returned.
pub fn parse(variant: SiteVariant, payload: &str) -> Result<SceneSource, ResolveError> {
    let source = match variant {
        SiteVariant::Realsee => {
            let data: ModuleData = serde_json::from_str(payload)?;
            SceneSource::Embedded(Box::new(data.work))
        }
        SiteVariant::OpenRealsee => {
            let info: HouseInfo = serde_json::from_str(payload)?;
            SceneSource::Embedded(Box::new(info.firstscreen.default_work))
        }
        SiteVariant::RealseeCn => SceneSource::InitQuery(serde_json::from_str(payload)?),
    };
    Ok(source)
}

/// Pull `data.work` out of an init-data response.
pub fn work_from_init_data(mut response: Value) -> Result<RawWork, ResolveError> {
    match response.pointer_mut("/data/work").map(Value::take) {
        Some(work) if !work.is_null() => Ok(serde_json::from_value(work)?),
        _ => Err(ResolveError::EmptyScene),
    }
}
