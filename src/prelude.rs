//! Prelude module for convenient imports.
//!
//! ```rust
//! use upload_router::prelude::*;
//! ```

// Errors
pub use crate::errors::{UploadError, UploadResult};

// Provider registry
pub use crate::provider::{
    normalize, AwsConfig, CompatibleConfig, Credentials, GcsConfig, MinIoConfig, ProviderConfig,
    R2Config, SigningConfig, SpacesConfig,
};

// Signer
pub use crate::signer::{presign, sign_request, Method, PresignedUrl};

// Path engine
pub use crate::path::{compose_key, default_tail, sanitize_name};

// Schema DSL
pub use crate::schema::{
    file, image, object, ArraySchema, ByteSize, CompleteContext, ErrorContext, FileDescriptor,
    FileSchema, Hooks, Metadata, MiddlewareContext, ObjectSchema, PathOverride, Schema, SizeArg,
    StartContext,
};

// Storage client
pub use crate::storage::{
    check_file_exists, delete_file, delete_files, generate_presigned_download_url,
    generate_presigned_upload_url, get_file_info, get_file_url, list_files, list_files_stream,
    validate_file, DeleteManyResult, DeleteResult, FileInfo, ListFilesOptions, ListFilesPage,
    PresignedUpload, UploadUrlOptions, ValidationOutcome, ValidationRules,
};

// Configuration
pub use crate::config::{
    Built, Defaults, PathsConfig, RateLimiting, SchemaFactory, SecurityConfig, StorageFacade,
    UploadConfig, UploadConfigBuilder,
};

// Router
pub use crate::router::{CompletionRequest, CompletionResult, PresignResult, Route, Router};

// Universal handlers
pub use crate::handler::Handlers;

#[cfg(feature = "axum")]
pub use crate::handler::adapter::AxumHandlers;
