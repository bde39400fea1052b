//! Job providers.

#[cfg(feature = "dashscope-video")]
mod dashscope;
#[cfg(feature = "dashscope-video")]
pub use dashscope::{DashScopeProvider, DashScopeProviderBuilder, DashScopeVideoModel};

#[cfg(feature = "ark-video")]
mod ark;
#[cfg(feature = "ark-video")]
pub use ark::{
    ArkProvider, ArkProviderBuilder, ArkVideoModel, TaskFilter, TaskPage, TaskSummary,
};
