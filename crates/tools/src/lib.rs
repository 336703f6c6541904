//! Built-in tool implementations for Periscope.

pub mod fetch;
pub mod question;
pub mod search;
pub mod todo;

pub use fetch::{ContentFetcher, FetchTool, FetchedContent, HttpContentFetcher};
pub use question::QuestionTool;
pub use search::{
    HttpSearchProvider, ProviderRequest, SearchDepth, SearchImage, SearchInput, SearchProvider,
    SearchResponse, SearchResult, SearchTool, merge_responses,
};
pub use todo::{TodoItem, TodoReadTool, TodoStatus, TodoStore, TodoWriteTool};
