use crate::domain::auth::AuthenticatedUser;
use crate::domain::template::EmailTemplate;
use crate::domain::types::{TemplateId, UserId};
use crate::forms::templates::TemplateForm;
use crate::repository::{TemplateReader, TemplateWriter};
use crate::services::{ServiceError, ServiceResult, owner_id};

/// Own templates plus shared ones.
pub fn list_templates<R>(repo: &R, user: &AuthenticatedUser) -> ServiceResult<Vec<EmailTemplate>>
where
    R: TemplateReader + ?Sized,
{
    let user_id = owner_id(user)?;
    Ok(repo.list_templates(user_id)?)
}

pub fn get_template<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<EmailTemplate>
where
    R: TemplateReader + ?Sized,
{
    let user_id = owner_id(user)?;
    repo.get_template(TemplateId::new(id)?, user_id)?
        .filter(|template| template.is_visible_to(user_id))
        .ok_or(ServiceError::NotFound)
}

/// Shared templates are readable by everyone but only their owner may change them.
fn editable_template<R>(repo: &R, user_id: UserId, id: i32) -> ServiceResult<EmailTemplate>
where
    R: TemplateReader + ?Sized,
{
    repo.get_template(TemplateId::new(id)?, user_id)?
        .filter(|template| template.user_id == user_id)
        .ok_or(ServiceError::NotFound)
}

pub fn create_template<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: TemplateForm,
) -> ServiceResult<EmailTemplate>
where
    R: TemplateWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let new_template = form.to_new_template(user_id)?;
    repo.create_template(&new_template).map_err(|err| {
        log::error!("Failed to create template: {err}");
        err.into()
    })
}

pub fn update_template<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
    form: TemplateForm,
) -> ServiceResult<EmailTemplate>
where
    R: TemplateReader + TemplateWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let template = editable_template(repo, user_id, id)?;
    let updates = form.to_update()?;
    Ok(repo.update_template(template.id, &updates)?)
}

pub fn delete_template<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<()>
where
    R: TemplateReader + TemplateWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let template = editable_template(repo, user_id, id)?;
    repo.delete_template(template.id)?;
    Ok(())
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::template::TemplateType;
    use crate::domain::types::TemplateName;
    use crate::repository::mock::MockRepository;
    use crate::services::test_support::client_user;

    fn shared_template(owner: i32) -> EmailTemplate {
        let at = NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        EmailTemplate {
            id: TemplateId::new(4).unwrap(),
            user_id: UserId::new(owner).unwrap(),
            name: TemplateName::new("Monthly newsletter").unwrap(),
            template_type: TemplateType::Newsletter,
            subject: "News".into(),
            html_content: "<p>News</p>".into(),
            text_content: None,
            is_active: true,
            is_shared: true,
            usage_count: 3,
            last_used_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn shared_templates_are_readable() {
        let mut repo = MockRepository::new();
        repo.expect_get_template()
            .returning(|_, _| Ok(Some(shared_template(2))));

        let template = get_template(&repo, &client_user(), 4).unwrap();
        assert_eq!(template.usage_count, 3);
    }

    #[test]
    fn shared_templates_of_others_cannot_be_deleted() {
        let mut repo = MockRepository::new();
        repo.expect_get_template()
            .returning(|_, _| Ok(Some(shared_template(2))));
        repo.expect_delete_template().times(0);

        assert!(matches!(
            delete_template(&repo, &client_user(), 4),
            Err(ServiceError::NotFound)
        ));
    }

    #[test]
    fn own_template_is_updated() {
        let mut repo = MockRepository::new();
        repo.expect_get_template()
            .returning(|_, _| Ok(Some(shared_template(1))));
        repo.expect_update_template()
            .withf(|_, updates| updates.subject == "Fresh news" && !updates.is_active)
            .times(1)
            .returning(|_, _| Ok(shared_template(1)));
        let form = TemplateForm {
            name: "Monthly newsletter".into(),
            subject: " Fresh news ".into(),
            ..TemplateForm::default()
        };

        assert!(update_template(&repo, &client_user(), 4, form).is_ok());
    }
}
