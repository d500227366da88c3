mod settings;

pub use settings::{
    DeliverySettings, LoggingSettings, MissingPlaceholderMode, RetrySettings, Settings,
    TelegramSettings, TemplateSettings,
};
