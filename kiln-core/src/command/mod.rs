//! Enqueued commands.
//!
//! A [`CommandNode`] is one enqueued operation: the [`Command`] payload, the
//! device it targets, an optional owning [`Event`](crate::event::Event), and
//! the wait-list of events it depends on.
//!
//! [`Command`] is a closed sum type. The dispatcher matches it exhaustively,
//! so adding a kind is a compile-time obligation. Kinds the enqueue layer can
//! build but the engine cannot execute arrive as [`Command::Unsupported`].

mod allocator;
mod kind;
mod node;
mod payload;

pub use allocator::{NodeAllocator, NodeStorage, SystemAllocator};
pub use kind::CommandType;
pub use node::{CommandNode, NodeParts};
pub use payload::{
    BufferCopy, BufferFill, BufferTransfer, ImageFill, ImageTransfer, KernelLaunch, MapCommand,
    NativeFn, NativeKernel, SvmFree, SvmFreeFn, SvmMap, SvmMemFill, SvmMemcpy, SvmUnmap,
    UnmapCommand,
};

/// The operation a command node performs.
#[derive(Debug)]
pub enum Command {
    ReadBuffer(BufferTransfer),
    WriteBuffer(BufferTransfer),
    CopyBuffer(BufferCopy),
    /// Map a buffer or an image.
    Map(MapCommand),
    ReadImage(ImageTransfer),
    WriteImage(ImageTransfer),
    Unmap(UnmapCommand),
    NdRangeKernel(KernelLaunch),
    NativeKernel(NativeKernel),
    FillImage(ImageFill),
    FillBuffer(BufferFill),
    /// Synchronization point with no device work.
    Marker,
    SvmFree(SvmFree),
    SvmMap(SvmMap),
    SvmUnmap(SvmUnmap),
    SvmMemcpy(SvmMemcpy),
    SvmMemFill(SvmMemFill),
    /// A kind this engine does not execute.
    Unsupported(CommandType),
}

impl Command {
    /// The kind of this command.
    pub fn command_type(&self) -> CommandType {
        match self {
            Self::ReadBuffer(_) => CommandType::ReadBuffer,
            Self::WriteBuffer(_) => CommandType::WriteBuffer,
            Self::CopyBuffer(_) => CommandType::CopyBuffer,
            Self::Map(map) if map.is_image => CommandType::MapImage,
            Self::Map(_) => CommandType::MapBuffer,
            Self::ReadImage(_) => CommandType::ReadImage,
            Self::WriteImage(_) => CommandType::WriteImage,
            Self::Unmap(_) => CommandType::UnmapMemObject,
            Self::NdRangeKernel(_) => CommandType::NdRangeKernel,
            Self::NativeKernel(_) => CommandType::NativeKernel,
            Self::FillImage(_) => CommandType::FillImage,
            Self::FillBuffer(_) => CommandType::FillBuffer,
            Self::Marker => CommandType::Marker,
            Self::SvmFree(_) => CommandType::SvmFree,
            Self::SvmMap(_) => CommandType::SvmMap,
            Self::SvmUnmap(_) => CommandType::SvmUnmap,
            Self::SvmMemcpy(_) => CommandType::SvmMemcpy,
            Self::SvmMemFill(_) => CommandType::SvmMemfill,
            Self::Unsupported(kind) => *kind,
        }
    }
}
