//! DestinationResolver - record -> engine / content source

use contracts::{Destination, IndexerError, Record, Template};

/// Computes the destination of each record from a constant or templated expression
#[derive(Debug, Clone)]
pub struct DestinationResolver {
    template: Template,
    constant: Option<Destination>,
}

impl DestinationResolver {
    /// Parse the destination expression
    ///
    /// `field` is the configuration key, used in the error.
    pub fn new(field: &str, expression: &str) -> Result<Self, IndexerError> {
        let template = Template::parse(expression)
            .map_err(|e| IndexerError::configuration(field, e.to_string()))?;
        if expression.is_empty() {
            return Err(IndexerError::configuration(field, "must not be empty"));
        }

        let constant = template
            .is_constant()
            .then(|| Destination::new(template.source()));

        Ok(Self { template, constant })
    }

    /// Destination shared by every record, when the expression has no placeholders
    pub fn constant(&self) -> Option<&Destination> {
        self.constant.as_ref()
    }

    pub fn expression(&self) -> &str {
        self.template.source()
    }

    pub fn resolve(&self, record: &Record) -> Destination {
        match &self.constant {
            Some(destination) => destination.clone(),
            None => Destination::from(self.template.render(record)),
        }
    }
}
