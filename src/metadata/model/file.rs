use std::path::{Path, PathBuf};

use ouroboros::self_referencing;

use crate::{file::File, metadata::model::MetadataModule, Result};

#[self_referencing]
struct ModuleImage {
    file: File,
    #[borrows(file)]
    #[covariant]
    module: MetadataModule<'this>,
}

impl ModuleImage {
    fn load(file: File) -> Result<ModuleImage> {
        ModuleImage::try_new(file, |file| MetadataModule::from_file(file))
    }
}

/// An opened component: its backing bytes and the modules parsed from them.
///
/// Everything reachable from a module borrows from this struct, so the file has to outlive
/// every view taken from it.
pub struct MetadataFile {
    name: String,
    path: Option<PathBuf>,
    manifest: ModuleImage,
    modules: Vec<ModuleImage>,
}

impl MetadataFile {
    /// Open the component at `path`, reading only its own module.
    ///
    /// # Errors
    /// Fails if the file can't be mapped or carries no readable metadata.
    pub fn open(path: &Path) -> Result<MetadataFile> {
        let image = ModuleImage::load(File::from_file(path)?)?;
        let mut file = MetadataFile::from_image(image)?;
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    /// Open the component at `path` together with the modules its `File` table lists.
    ///
    /// Modules are looked up next to `path`. Listed modules that don't exist on disk are
    /// skipped.
    ///
    /// # Errors
    /// Fails if the component or one of its existing modules can't be read.
    pub fn open_with_modules(path: &Path) -> Result<MetadataFile> {
        let mut file = MetadataFile::open(path)?;
        let folder = path.parent().unwrap_or_else(|| Path::new("."));

        let names: Vec<String> = file
            .manifest_module()
            .files()?
            .into_iter()
            .filter(|entry| entry.has_metadata)
            .map(|entry| entry.name.to_string())
            .collect();

        for name in names {
            let module_path = folder.join(&name);
            if !module_path.is_file() {
                tracing::debug!("Module {} of {} not found", name, file.name);
                continue;
            }

            file.modules
                .push(ModuleImage::load(File::from_file(&module_path)?)?);
        }

        Ok(file)
    }

    /// Parse a component held in memory, either a PE image or a bare metadata blob.
    ///
    /// # Errors
    /// Fails if `data` carries no readable metadata.
    pub fn from_mem(data: Vec<u8>) -> Result<MetadataFile> {
        MetadataFile::from_image(ModuleImage::load(File::from_mem(data)?)?)
    }

    fn from_image(image: ModuleImage) -> Result<MetadataFile> {
        let name = image.with_module(|module| -> Result<String> {
            Ok(match module.assembly_name()? {
                Some(name) => name.to_string(),
                None => module.name()?.to_string(),
            })
        })?;

        Ok(MetadataFile {
            name,
            path: None,
            manifest: image,
            modules: Vec::new(),
        })
    }

    /// The assembly name, or the module name for modules without a manifest.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path the file was opened from.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The manifest module.
    #[must_use]
    pub fn manifest_module(&self) -> &MetadataModule<'_> {
        self.manifest.borrow_module()
    }

    /// All loaded modules, manifest module first.
    pub fn modules(&self) -> impl Iterator<Item = &MetadataModule<'_>> {
        std::iter::once(&self.manifest)
            .chain(&self.modules)
            .map(ModuleImage::borrow_module)
    }
}
