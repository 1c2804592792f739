use thiserror::Error;

/// Why a tick or an immediate render was aborted.
#[derive(Debug, Error)]
pub enum RenderError<E: std::error::Error + 'static> {
	/// An element's `children` prop is present but not a sequence of elements.
	#[error("<{element_type}> was created with a `children` prop that is not a sequence of elements")]
	MalformedChildren { element_type: String },

	/// A host operation failed. Host mutations applied before the failure are not rolled back.
	#[error("host operation failed")]
	Host(#[source] E),
}
