//! Command kind enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every kind of command the enqueue layer can build.
///
/// The drain engine executes a subset of these; the rest reach it only as
/// [`super::Command::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    ReadBuffer,
    WriteBuffer,
    CopyBuffer,
    MapBuffer,
    MapImage,
    ReadImage,
    WriteImage,
    UnmapMemObject,
    #[serde(rename = "ndrange_kernel")]
    NdRangeKernel,
    NativeKernel,
    FillImage,
    FillBuffer,
    Marker,
    SvmFree,
    SvmMap,
    SvmUnmap,
    SvmMemcpy,
    SvmMemfill,
    Task,
    ReadBufferRect,
    WriteBufferRect,
    CopyBufferRect,
    CopyImage,
    CopyImageToBuffer,
    CopyBufferToImage,
    MigrateMemObjects,
    Barrier,
    User,
}

impl CommandType {
    /// Snake-case name of the command kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadBuffer => "read_buffer",
            Self::WriteBuffer => "write_buffer",
            Self::CopyBuffer => "copy_buffer",
            Self::MapBuffer => "map_buffer",
            Self::MapImage => "map_image",
            Self::ReadImage => "read_image",
            Self::WriteImage => "write_image",
            Self::UnmapMemObject => "unmap_mem_object",
            Self::NdRangeKernel => "ndrange_kernel",
            Self::NativeKernel => "native_kernel",
            Self::FillImage => "fill_image",
            Self::FillBuffer => "fill_buffer",
            Self::Marker => "marker",
            Self::SvmFree => "svm_free",
            Self::SvmMap => "svm_map",
            Self::SvmUnmap => "svm_unmap",
            Self::SvmMemcpy => "svm_memcpy",
            Self::SvmMemfill => "svm_memfill",
            Self::Task => "task",
            Self::ReadBufferRect => "read_buffer_rect",
            Self::WriteBufferRect => "write_buffer_rect",
            Self::CopyBufferRect => "copy_buffer_rect",
            Self::CopyImage => "copy_image",
            Self::CopyImageToBuffer => "copy_image_to_buffer",
            Self::CopyBufferToImage => "copy_buffer_to_image",
            Self::MigrateMemObjects => "migrate_mem_objects",
            Self::Barrier => "barrier",
            Self::User => "user",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
