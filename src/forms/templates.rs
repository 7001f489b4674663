use serde::Deserialize;
use validator::Validate;

use crate::domain::template::{NewEmailTemplate, TemplateType, UpdateEmailTemplate};
use crate::domain::types::{TemplateName, UserId};
use crate::forms::{FormError, checkbox, trimmed};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct TemplateForm {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub template_type: Option<String>,
    #[validate(length(max = 300))]
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub html_content: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_shared: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_active: bool,
}

impl TemplateForm {
    fn parts(&self) -> Result<(TemplateName, TemplateType), FormError> {
        self.validate()?;
        let template_type = match trimmed(self.template_type.clone()) {
            Some(code) => code.parse()?,
            None => TemplateType::Custom,
        };
        Ok((TemplateName::new(self.name.trim())?, template_type))
    }

    pub fn to_new_template(&self, user_id: UserId) -> Result<NewEmailTemplate, FormError> {
        let (name, template_type) = self.parts()?;
        Ok(NewEmailTemplate {
            user_id,
            name,
            template_type,
            subject: self.subject.trim().to_string(),
            html_content: self.html_content.clone(),
            text_content: trimmed(self.text_content.clone()),
            is_shared: self.is_shared,
        })
    }

    pub fn to_update(&self) -> Result<UpdateEmailTemplate, FormError> {
        let (name, template_type) = self.parts()?;
        Ok(UpdateEmailTemplate {
            name,
            template_type,
            subject: self.subject.trim().to_string(),
            html_content: self.html_content.clone(),
            text_content: trimmed(self.text_content.clone()),
            is_active: self.is_active,
            is_shared: self.is_shared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_template_type_is_rejected() {
        let form = TemplateForm {
            name: "Welcome".into(),
            template_type: Some("poster".into()),
            ..TemplateForm::default()
        };
        assert!(form.to_new_template(UserId::new(1).unwrap()).is_err());
    }

    #[test]
    fn html_is_kept_verbatim() {
        let form = TemplateForm {
            name: "Welcome".into(),
            template_type: Some("welcome".into()),
            html_content: "<p>Hi {{first_name}}</p>".into(),
            ..TemplateForm::default()
        };
        let template = form.to_new_template(UserId::new(1).unwrap()).unwrap();
        assert_eq!(template.template_type, TemplateType::Welcome);
        assert_eq!(template.html_content, "<p>Hi {{first_name}}</p>");
    }
}
