//! HTML extraction and browser-based image export.

mod crop;
mod format;
#[cfg(feature = "pdf")]
mod pdf;
mod scratch;

pub use crop::{scaling_factor, CropRect, DEVICE_PIXEL_RATIO};
pub use format::{resolve_output, OutputFormat};
pub use scratch::ScratchPage;

use crate::driver::{BrowserSession, DriverLauncher, ElementRect, LaunchSpec, Launcher};
use crate::table::{HtmlRender, RenderContext, RenderTable};
use crate::{Result, SaveOptions};
use image::{DynamicImage, ImageReader};
use log::{debug, info, warn};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Get the HTML content of a table.
///
/// `make_page` wraps the fragment in a complete HTML document and
/// `all_important` marks every generated CSS declaration `!important`.
///
/// # Examples
///
/// ```
/// use tablesnap::table::{Column, Table};
///
/// let table = Table::new(vec![Column::new("x")]).row(["1"]);
/// let html = tablesnap::as_raw_html(&table, false, false);
/// assert_eq!(html.matches("<table").count(), 1);
/// ```
pub fn as_raw_html<T>(table: &T, make_page: bool, all_important: bool) -> String
where
    T: RenderTable + ?Sized,
{
    table
        .build_data(RenderContext::Html)
        .render_as_html(make_page, all_important)
}

/// Save a table as an image or PDF using the default browser drivers.
///
/// Returns the path written, which has `.png` appended when `file` has no
/// extension. See [`Exporter::save`].
pub fn save<T>(table: &T, file: impl AsRef<Path>, options: &SaveOptions) -> Result<PathBuf>
where
    T: RenderTable + ?Sized,
{
    Exporter::new().save(table, file, options)
}

/// Runs the export pipeline against a [`Launcher`].
#[derive(Debug, Clone, Default)]
pub struct Exporter<L = DriverLauncher> {
    launcher: L,
}

impl Exporter {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What the browser reported for the target element
#[derive(Debug, Clone)]
pub struct Capture {
    pub rect: ElementRect,
    pub png: Vec<u8>,
}

impl<L: Launcher> Exporter<L> {
    pub fn with_launcher(launcher: L) -> Self {
        Self { launcher }
    }

    /// Screenshot the table in a headless browser, crop it to the selected
    /// element plus the expansion margin, and write it to `file`.
    ///
    /// The output format follows the file extension (`.png` is appended when
    /// there is none). The scratch HTML and its directory are deleted, and the
    /// browser session closed, whether or not any step fails.
    pub fn save<T>(&self, table: &T, file: impl AsRef<Path>, options: &SaveOptions) -> Result<PathBuf>
    where
        T: RenderTable + ?Sized,
    {
        options.validate()?;
        let (path, format) = resolve_output(file.as_ref())?;
        format.ensure_available()?;

        let spec = LaunchSpec::from_options(options);
        self.launcher.check(&spec)?;

        let html = as_raw_html(table, false, false);
        let capture = {
            let page = ScratchPage::write(&html)?;
            debug!("wrote {} bytes of HTML to {}", html.len(), page.path().display());
            self.capture(&spec, &page.url()?, options)?
        };

        let crop = CropRect::compute(&capture.rect, options.scale, options.expand);
        debug!("cropping screenshot to {:?}", crop);
        let screenshot = decode_screenshot(&capture.png)?;
        let cropped = crop.apply(&screenshot)?;
        format.write(&cropped, &path)?;

        info!(
            "saved {}x{} table image to {}",
            cropped.width(),
            cropped.height(),
            path.display()
        );
        Ok(path)
    }

    /// Launch a session, render `url` and capture the element, closing the
    /// session on every path.
    pub fn capture(&self, spec: &LaunchSpec, url: &str, options: &SaveOptions) -> Result<Capture> {
        let mut session = self.launcher.launch(spec)?;
        let result = capture_element(session.as_mut(), url, options);
        if let Err(e) = session.close() {
            warn!("Failed to close {} session: {}", spec.driver, e);
        }
        result
    }
}

/// Script setting the page zoom to `scale` as a percentage
pub fn zoom_script(scale: f64) -> String {
    format!("document.body.style.zoom = '{}%'", scale * 100.0)
}

fn capture_element(session: &mut dyn BrowserSession, url: &str, options: &SaveOptions) -> Result<Capture> {
    session.navigate(url)?;
    session.execute_script(&zoom_script(options.scale))?;
    let rect = session.find_element_rect(&options.selector)?;
    let png = session.screenshot_png()?;
    Ok(Capture { rect, png })
}

/// Decode screenshot bytes with decoder size limits lifted for this call only.
pub fn decode_screenshot(bytes: &[u8]) -> Result<DynamicImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.no_limits();
    Ok(reader.decode()?)
}
