// mhtml2html — convert MHTML (MIME HTML) archives into self-contained,
// data-URI-inlined HTML documents.
//
// Architecture:
//   MHTML bytes → parser (state machine) → Archive → DOM provider → rewriter → HTML string
//
// The parser (`parser`) turns a `multipart/related` byte stream into an
// `Archive` of resources keyed by URL and by Content-ID. The DOM rewriter
// (`dom`) walks the index resource's parsed tree, inlining referenced CSS
// and images as `data:` URIs and, optionally, recursively converting
// `cid:`-addressed iframes.

mod css;
mod decode;
pub mod dom;
mod error;
mod parser;
mod resolver;
mod resource;

pub use dom::{ConvertOptions, DomProvider, Html5everProvider};
pub use error::MhtmlError;
pub use parser::ParseOptions;
pub use resource::{Archive, Envelope, Resource, TransferEncoding};

/// Parse raw MHTML bytes into an [`Archive`] without rendering a DOM.
///
/// Useful when callers only need the resource table (e.g. to inspect
/// attachments) and not a converted HTML document.
///
/// # Examples
///
/// ```
/// let mhtml = concat!(
///     "Content-Type: multipart/related; boundary=\"B\"\n\n",
///     "--B\n",
///     "Content-Type: text/html\n",
///     "Content-Transfer-Encoding: 7bit\n",
///     "Content-Location: http://example.com/\n\n",
///     "<html><body>Hi</body></html>\n",
///     "--B--\n",
/// );
/// let archive = mhtml2html::parse(mhtml.as_bytes(), &mhtml2html::ParseOptions::default()).unwrap();
/// assert!(archive.validate());
/// ```
pub fn parse(data: &[u8], options: &ParseOptions) -> Result<Archive, MhtmlError> {
    parser::parse_archive(data, options)
}

/// Parse and convert an MHTML archive into a self-contained HTML string,
/// using the default [`Html5everProvider`].
pub fn convert(data: &[u8], options: &ConvertOptions) -> Result<String, MhtmlError> {
    convert_with(data, options, &Html5everProvider)
}

/// Parse and convert an MHTML archive using a caller-supplied [`DomProvider`].
pub fn convert_with<P>(data: &[u8], options: &ConvertOptions, provider: &P) -> Result<String, MhtmlError>
where
    P: DomProvider<Tree = markup5ever_rcdom::Handle>,
{
    let archive = parser::parse_archive(data, &ParseOptions::default())?;
    convert_archive_with(&archive, options, provider)
}

/// Render an already-parsed [`Archive`] into a self-contained HTML string.
pub fn convert_archive(archive: &Archive, options: &ConvertOptions) -> Result<String, MhtmlError> {
    convert_archive_with(archive, options, &Html5everProvider)
}

/// Render an already-parsed [`Archive`] using a caller-supplied [`DomProvider`].
pub fn convert_archive_with<P>(
    archive: &Archive,
    options: &ConvertOptions,
    provider: &P,
) -> Result<String, MhtmlError>
where
    P: DomProvider<Tree = markup5ever_rcdom::Handle>,
{
    if !archive.validate() {
        return Err(MhtmlError::InvalidArchive(
            "index resource is missing or is not text/html".into(),
        ));
    }

    let index_resource = &archive.media[&archive.index];
    let raw_bytes = decode::decode(&index_resource.data, index_resource.transfer_encoding).ok_or_else(|| {
        MhtmlError::InvalidArchive(format!("failed to decode index resource {}", archive.index))
    })?;
    let html = String::from_utf8_lossy(&raw_bytes).into_owned();

    let tree = provider.parse_html(&html);
    dom::rewrite(&tree, archive, options, provider)?;
    Ok(dom::serialize(&tree))
}
