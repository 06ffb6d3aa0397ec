use crate::pdf_utils::{self, resolve, resolve_dict};
use crate::source::RawAttachment;
use crate::{AnalysisError, Result};
use lopdf::{Dictionary, Document, Object, Stream};

/// Reads embedded files out of file specification objects.
///
/// Layout of a file specification (PDF spec §7.11.3):
///
/// ```text
/// <<
///   /Type  /Filespec
///   /F     (ascii filename)
///   /UF    (unicode filename)          ← preferred
///   /EF    <<
///              /F   <stream-ref>       ← the actual data stream
///              /UF  <stream-ref>       ← alternative key, same stream
///          >>
/// >>
/// ```
pub(crate) struct FileSpecParser<'a> {
    document: &'a Document,
}

impl<'a> FileSpecParser<'a> {
    pub(crate) fn new(document: &'a Document) -> Self {
        Self { document }
    }

    fn extraction_error(name: &str, message: &str) -> AnalysisError {
        AnalysisError::SourceError(format!("embedded file '{name}': {message}"))
    }

    /// Parse a file specification (inline or indirect) into its filename and
    /// decoded content. `name` is used for error messages and as the last
    /// filename fallback.
    pub(crate) fn parse(&self, name: &str, spec: &Object) -> Result<RawAttachment> {
        let spec_dict = resolve_dict(self.document, spec)
            .ok_or_else(|| Self::extraction_error(name, "file spec is not a dictionary"))?;
        let ef_dict = self.resolve_ef_dictionary(spec_dict, name)?;
        let stream = self.extract_embedded_stream(ef_dict, name)?;

        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        Ok(RawAttachment {
            filename: self.best_filename(spec_dict, name),
            content,
        })
    }

    /// `/EF` is normally inline; some producers store it as a reference.
    fn resolve_ef_dictionary<'s>(
        &'s self,
        spec_dict: &'s Dictionary,
        name: &str,
    ) -> Result<&'s Dictionary> {
        let ef_val = spec_dict
            .get(b"EF")
            .map_err(|_| Self::extraction_error(name, "missing /EF entry"))?;
        resolve_dict(self.document, ef_val)
            .ok_or_else(|| Self::extraction_error(name, "/EF is not a dictionary"))
    }

    fn extract_embedded_stream<'s>(
        &'s self,
        ef_dict: &'s Dictionary,
        name: &str,
    ) -> Result<&'s Stream> {
        // /UF preferred over /F (unicode vs. ASCII path)
        let stream_ref = ef_dict
            .get(b"UF")
            .or_else(|_| ef_dict.get(b"F"))
            .map_err(|_| Self::extraction_error(name, "/EF has neither /F nor /UF"))?;

        resolve(self.document, stream_ref)
            .and_then(|o| o.as_stream().ok())
            .ok_or_else(|| Self::extraction_error(name, "embedded stream object is not a stream"))
    }

    /// Unicode (/UF) > ASCII (/F) > fallback.
    fn best_filename(&self, spec_dict: &Dictionary, fallback: &str) -> String {
        for key in [b"UF" as &[u8], b"F"] {
            if let Some(name) = pdf_utils::extract_string_from_dict(self.document, spec_dict, key) {
                return name;
            }
        }
        fallback.into()
    }
}
