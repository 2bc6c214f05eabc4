use plugreg_core::ImageDef;
use plugreg_storage::{Attributes, Query, RecordId, RecordKind};
use serde_json::json;

use super::{Reconciler, text};
use crate::error::Result;
use crate::handles::{ImageRef, StepRef, Upserted};

impl Reconciler<'_> {
    /// Resolves the image by (step, image type, entity alias) and creates or
    /// updates its attribute set.
    pub async fn upsert_image(
        &mut self,
        step: &StepRef,
        desired: &ImageDef,
    ) -> Result<Upserted<ImageRef>> {
        let key = desired.key().to_string();
        let query = Query::new(RecordKind::StepImage)
            .with_lookup("sdkmessageprocessingstepid", step.id())
            .with_eq("imagetype", desired.image_type.code())
            .with_eq("entityalias", desired.entity_alias.trim())
            .select(["name", "imagetype", "entityalias"]);
        let existing = self.find_existing(&query, &key).await?;

        let upserted = self
            .apply(
                RecordKind::StepImage,
                existing.map(|r| r.id),
                image_attributes(step, desired),
                desired.id.map(RecordId::from_uuid),
                &key,
            )
            .await?;
        Ok(upserted.map(|id| ImageRef::new(id, step)))
    }
}

fn image_attributes(step: &StepRef, desired: &ImageDef) -> Attributes {
    let columns = desired
        .attributes
        .as_ref()
        .and_then(|set| set.to_platform_string());

    let mut attributes = Attributes::new();
    attributes.insert(
        "sdkmessageprocessingstepid".into(),
        json!(step.id().to_string()),
    );
    attributes.insert("name".into(), json!(desired.name()));
    attributes.insert("imagetype".into(), json!(desired.image_type.code()));
    attributes.insert("entityalias".into(), json!(desired.entity_alias.trim()));
    attributes.insert("attributes".into(), text(columns.as_deref()));
    attributes.insert(
        "messagepropertyname".into(),
        json!(desired.message_property_name(step.message_name())),
    );
    attributes
}
