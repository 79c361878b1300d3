//! One compute cycle, from request to a scene graph ready to swap in.

use url::Url;

use crate::compute::{solve, ComputeError, Transport};
use crate::decode::{decode_response, Decoded};
use crate::document::GeometryDocument;
use crate::metrics::NamedMetrics;
use crate::scene::{self, SceneNode};

/// Everything a successful solve hands back to the UI thread.
#[derive(Debug)]
pub struct Solved {
    pub document: GeometryDocument,
    pub root: SceneNode,
    pub metrics: NamedMetrics,
}

/// Result of one request, tagged with its sequence number.
pub type Completion = (u64, Result<Solved, ComputeError>);

/// Fetches, decodes and converts. Does not touch any shared state.
pub async fn run_solve<T: Transport>(transport: &T, url: &Url) -> Result<Solved, ComputeError> {
    let response = solve(transport, url).await?;
    let Decoded { document, metrics, decoded_items } = decode_response(&response)?;
    log::info!("decoded {decoded_items} objects from {} outputs", response.values.len());

    let bytes = document.to_bytes()?;
    let mut root = scene::import(&bytes)?;
    scene::apply_materials(&mut root);

    Ok(Solved { document, root, metrics })
}
