use coursedeck_shared::{ContentItem, Course};

use super::storage::UploadStorage;

/// Delete every uploaded file a course references: its thumbnail and the
/// files owned by its contents. Returns how many files were removed.
pub fn delete_course_files(storage: &UploadStorage, course: &Course) -> usize {
    let removed = delete_all(storage, course.file_urls());
    tracing::info!(course_id = %course.id, removed, "Cleaned up course files");
    removed
}

/// Delete the files owned by one content item.
pub fn delete_content_files(storage: &UploadStorage, item: &ContentItem) -> usize {
    delete_all(storage, item.body.file_urls())
}

/// Delete the files owned by items that left a course together, such as
/// the ones a reorder dropped.
pub fn delete_contents_files(storage: &UploadStorage, items: &[ContentItem]) -> usize {
    items.iter().map(|item| delete_content_files(storage, item)).sum()
}

fn delete_all<'a>(storage: &UploadStorage, urls: impl IntoIterator<Item = &'a str>) -> usize {
    urls.into_iter().filter(|url| storage.delete_url(url)).count()
}
