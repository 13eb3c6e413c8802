use std::path::PathBuf;

use anyhow::Result;

use super::super::Container;

pub struct ConvertController<'a> {
    container: &'a Container,
}

impl<'a> ConvertController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn convert(&self, midi: PathBuf) -> Result<String> {
        let use_case = self.container.convert_use_case();
        let artifact = use_case.execute(&midi).await?;

        Ok(format!(
            "Converted {} -> {}",
            midi.display(),
            artifact.path.display()
        ))
    }
}
