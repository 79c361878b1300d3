//! "Download" button: hands the current document to the user as a `.3dm` file.

pub const MIME_TYPE: &str = "application/octet-stream";

/// `solarcanopy.gh` → `solarcanopy.3dm`.
pub fn download_filename(definition: &str) -> String {
    let stem = definition.strip_suffix(".gh").unwrap_or(definition);
    format!("{stem}.3dm")
}

/// Hidden-link trick: Blob → object URL → `<a download>` click.
#[cfg(target_arch = "wasm32")]
pub fn save_bytes(filename: &str, bytes: &[u8]) -> anyhow::Result<()> {
    use anyhow::anyhow;
    use wasm_bindgen::JsCast;

    let window = web_sys::window().ok_or_else(|| anyhow!("no window"))?;
    let document = window.document().ok_or_else(|| anyhow!("no document"))?;

    let array = js_sys::Uint8Array::new_with_length(bytes.len() as u32);
    array.copy_from(bytes);
    let parts = js_sys::Array::new();
    parts.push(&array.buffer());

    let options = web_sys::BlobPropertyBag::new();
    options.set_type(MIME_TYPE);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
        .map_err(|e| anyhow!("creating blob: {e:?}"))?;
    let url = web_sys::Url::create_object_url_with_blob(&blob)
        .map_err(|e| anyhow!("creating object url: {e:?}"))?;

    let link = document
        .create_element("a")
        .map_err(|e| anyhow!("creating link: {e:?}"))?
        .dyn_into::<web_sys::HtmlAnchorElement>()
        .map_err(|_| anyhow!("element is not an anchor"))?;
    link.set_href(&url);
    link.set_download(filename);
    link.click();

    let _ = web_sys::Url::revoke_object_url(&url);
    Ok(())
}

/// Desktop: writes next to the working directory.
#[cfg(not(target_arch = "wasm32"))]
pub fn save_bytes(filename: &str, bytes: &[u8]) -> anyhow::Result<()> {
    use anyhow::Context as _;

    std::fs::write(filename, bytes).with_context(|| format!("writing {filename}"))?;
    log::info!("saved {} bytes to {filename}", bytes.len());
    Ok(())
}
