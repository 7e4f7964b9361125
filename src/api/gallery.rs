//! Purpose: Typed operations over the gallery site's collections.
//! Exports: `GalleryClient`, `collections`, `ExhibitionKind`,
//! `ExhibitionsByKind`, `MediaUpload`, `NewWork`, `NewProject`.
//! Role: One method per admin-panel operation; validation happens here,
//! before anything touches a store.
//! Invariants: A record that references uploaded media is only inserted
//! after the upload succeeds.
//! Invariants: Every successful write invalidates the collection's cached
//! first page; the remote store stays authoritative.

use crate::api::cache::PageCache;
use crate::core::error::{Error, ErrorKind};
use crate::core::fetch::PagedFetcher;
use crate::core::record::Record;
use crate::core::store::{MediaStore, RecordStore};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

/// Collection names used by the gallery site.
pub mod collections {
    pub const EXHIBITIONS: &str = "exhibitions";
    pub const UPCOMING_EXHIBITIONS: &str = "upcoming_exhibitions";
    pub const EXHIBITION_IMAGES: &str = "exhibition_images";
    pub const PAINTINGS: &str = "paintings";
    pub const PROJECTS: &str = "projects";
    pub const VIDEOS: &str = "videos";
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExhibitionKind {
    Group,
    Solo,
    Special,
}

impl ExhibitionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExhibitionKind::Group => "Group",
            ExhibitionKind::Solo => "Solo",
            ExhibitionKind::Special => "Special",
        }
    }
}

impl fmt::Display for ExhibitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExhibitionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "group" => Ok(ExhibitionKind::Group),
            "solo" => Ok(ExhibitionKind::Solo),
            "special" => Ok(ExhibitionKind::Special),
            _ => Err(Error::new(ErrorKind::InvalidArgument)
                .with_message("exhibition kind must be Group, Solo, or Special")),
        }
    }
}

/// Read-only projection grouping accumulated exhibition records by their
/// `type` field. Records with an unknown kind fall into none of the groups,
/// matching the site's three-column rendering.
#[derive(Debug, Default)]
pub struct ExhibitionsByKind<'a> {
    pub group: Vec<&'a Record>,
    pub solo: Vec<&'a Record>,
    pub special: Vec<&'a Record>,
}

impl<'a> ExhibitionsByKind<'a> {
    pub fn project(records: &'a [Record]) -> Self {
        let mut out = Self::default();
        for record in records {
            match record.field_str("type") {
                Some("Group") => out.group.push(record),
                Some("Solo") => out.solo.push(record),
                Some("Special") => out.special.push(record),
                _ => {}
            }
        }
        out
    }
}

/// Bytes destined for the media store plus the name to file them under.
#[derive(Clone, Debug)]
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub name: String,
}

/// Input for a new studio work. All text fields are required; the image is
/// optional (uploaded first when present).
#[derive(Clone, Debug, Default)]
pub struct NewWork {
    pub caption: String,
    pub measurements: String,
    pub medium: String,
    pub gallery: String,
    pub image: Option<MediaUpload>,
}

/// Input for a new project page. The first five fields are required; the
/// list-valued fields may be empty.
#[derive(Clone, Debug, Default)]
pub struct NewProject {
    pub title: String,
    pub date: String,
    pub main_image: String,
    pub description: String,
    pub video: String,
    pub additional_images: Vec<String>,
    pub research_images: Vec<Value>,
    pub icon: Option<String>,
    pub about: Vec<String>,
    pub partners: Vec<String>,
    pub references: Vec<Value>,
}

/// Client for the gallery's collections. Both stores are injected; tests and
/// offline tools substitute `MemoryStore` for either.
#[derive(Debug)]
pub struct GalleryClient<R, M> {
    records: R,
    media: M,
    cache: Option<PageCache>,
}

impl<R: RecordStore, M: MediaStore> GalleryClient<R, M> {
    pub fn new(records: R, media: M) -> Self {
        Self {
            records,
            media,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: PageCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Paged fetcher over an arbitrary collection.
    pub fn fetcher(&self, collection: &str) -> PagedFetcher<&R> {
        PagedFetcher::new(&self.records, collection)
    }

    pub fn exhibitions(&self) -> PagedFetcher<&R> {
        self.fetcher(collections::EXHIBITIONS)
    }

    pub fn upcoming_exhibitions(&self) -> PagedFetcher<&R> {
        self.fetcher(collections::UPCOMING_EXHIBITIONS)
    }

    /// Upcoming exhibition shown on the landing page: the first record of the
    /// collection, read fresh on every call.
    pub fn upcoming_exhibition(&self) -> Result<Option<Record>, Error> {
        let page = self
            .records
            .query(collections::UPCOMING_EXHIBITIONS, 1, None)?;
        Ok(page.records.into_iter().next())
    }

    pub fn exhibition_images(&self) -> PagedFetcher<&R> {
        self.fetcher(collections::EXHIBITION_IMAGES)
    }

    pub fn works(&self) -> PagedFetcher<&R> {
        self.fetcher(collections::PAINTINGS)
    }

    pub fn projects(&self) -> PagedFetcher<&R> {
        self.fetcher(collections::PROJECTS)
    }

    pub fn add_exhibition(&self, title: &str, kind: ExhibitionKind) -> Result<String, Error> {
        require(title, "title")?;
        let mut fields = Map::new();
        fields.insert("title".to_string(), json!(title.trim()));
        fields.insert("type".to_string(), json!(kind.as_str()));
        self.insert(collections::EXHIBITIONS, fields)
    }

    pub fn remove_exhibition(&self, id: &str) -> Result<(), Error> {
        self.remove(collections::EXHIBITIONS, id)
    }

    pub fn add_work(&self, work: NewWork) -> Result<String, Error> {
        require(&work.caption, "caption")?;
        require(&work.measurements, "measurements")?;
        require(&work.medium, "medium")?;
        require(&work.gallery, "gallery")?;

        // Upload before insert: a failed upload must not leave a record
        // pointing at a blob that never landed.
        let src = match &work.image {
            Some(upload) => Some(self.media.upload(&upload.bytes, &upload.name)?),
            None => None,
        };

        let mut fields = Map::new();
        fields.insert("caption".to_string(), json!(work.caption.trim()));
        fields.insert("measurements".to_string(), json!(work.measurements.trim()));
        fields.insert("medium".to_string(), json!(work.medium.trim()));
        fields.insert("gallery".to_string(), json!(work.gallery.trim()));
        if let Some(src) = src {
            fields.insert("src".to_string(), json!(src));
        }
        self.insert(collections::PAINTINGS, fields)
    }

    pub fn remove_work(&self, id: &str) -> Result<(), Error> {
        self.remove(collections::PAINTINGS, id)
    }

    pub fn add_project(&self, project: NewProject) -> Result<String, Error> {
        require(&project.title, "title")?;
        require(&project.date, "date")?;
        require(&project.main_image, "main image")?;
        require(&project.description, "description")?;
        require(&project.video, "video")?;

        let mut fields = Map::new();
        fields.insert("title".to_string(), json!(project.title.trim()));
        fields.insert("date".to_string(), json!(project.date.trim()));
        fields.insert("mainImage".to_string(), json!(project.main_image.trim()));
        fields.insert("description".to_string(), json!(project.description.trim()));
        fields.insert("video".to_string(), json!(project.video.trim()));
        fields.insert(
            "additionalImages".to_string(),
            json!(project.additional_images),
        );
        fields.insert("researchImages".to_string(), json!(project.research_images));
        if let Some(icon) = &project.icon {
            fields.insert("icon".to_string(), json!(icon));
        }
        fields.insert("about".to_string(), json!(project.about));
        fields.insert("partners".to_string(), json!(project.partners));
        fields.insert("references".to_string(), json!(project.references));
        self.insert(collections::PROJECTS, fields)
    }

    pub fn remove_project(&self, id: &str) -> Result<(), Error> {
        self.remove(collections::PROJECTS, id)
    }

    pub fn add_exhibition_image(
        &self,
        image: MediaUpload,
        caption: Option<&str>,
    ) -> Result<String, Error> {
        let src = self.media.upload(&image.bytes, &image.name)?;
        let mut fields = Map::new();
        fields.insert("src".to_string(), json!(src));
        fields.insert("name".to_string(), json!(image.name));
        if let Some(caption) = caption {
            fields.insert("caption".to_string(), json!(caption));
        }
        self.insert(collections::EXHIBITION_IMAGES, fields)
    }

    pub fn remove_exhibition_image(&self, id: &str) -> Result<(), Error> {
        self.remove(collections::EXHIBITION_IMAGES, id)
    }

    /// Current splash video, cache first. The site plays the first record of
    /// the collection; nothing enforces a single record on write.
    pub fn splash_video(&self) -> Result<Option<Record>, Error> {
        if let Some(cache) = &self.cache
            && let Some(records) = cache.load(collections::VIDEOS)
            && let Some(first) = records.into_iter().next()
        {
            return Ok(Some(first));
        }
        let page = self.records.query(collections::VIDEOS, 1, None)?;
        if let Some(cache) = &self.cache {
            cache.store(collections::VIDEOS, &page.records);
        }
        Ok(page.records.into_iter().next())
    }

    pub fn set_splash_video(&self, video: MediaUpload) -> Result<String, Error> {
        let src = self.media.upload(&video.bytes, &video.name)?;
        let mut fields = Map::new();
        fields.insert("src".to_string(), json!(src));
        self.insert(collections::VIDEOS, fields)
    }

    pub fn clear_splash_video(&self, id: &str) -> Result<(), Error> {
        self.remove(collections::VIDEOS, id)
    }

    /// Cached first page for a collection, when a cache is configured and
    /// holds one. Strictly an initial-render aid.
    pub fn cached_first_page(&self, collection: &str) -> Option<Vec<Record>> {
        self.cache.as_ref()?.load(collection)
    }

    /// Remember a freshly fetched first page for the next initial render.
    pub fn remember_first_page(&self, collection: &str, records: &[Record]) {
        if let Some(cache) = &self.cache {
            cache.store(collection, records);
        }
    }

    fn insert(&self, collection: &str, fields: Map<String, Value>) -> Result<String, Error> {
        let id = self.records.insert(collection, fields)?;
        if let Some(cache) = &self.cache {
            cache.invalidate(collection);
        }
        tracing::debug!(collection, id = %id, "record inserted");
        Ok(id)
    }

    fn remove(&self, collection: &str, id: &str) -> Result<(), Error> {
        self.records.remove(collection, id)?;
        if let Some(cache) = &self.cache {
            cache.invalidate(collection);
        }
        tracing::debug!(collection, id, "record removed");
        Ok(())
    }
}

fn require(value: &str, what: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("{what} is required")));
    }
    Ok(())
}
