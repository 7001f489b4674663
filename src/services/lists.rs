use serde::Serialize;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::contact::Contact;
use crate::domain::contact_list::{ContactList, ContactTag};
use crate::domain::types::{ContactListId, TagId};
use crate::forms::lists::{ContactListForm, TagForm};
use crate::pagination::{DEFAULT_ITEMS_PER_PAGE, Paginated};
use crate::repository::{
    ContactListQuery, ContactListReader, ContactListWriter, ContactReader,
};
use crate::services::{ServiceError, ServiceResult, owner_id};

#[derive(Debug, Serialize)]
pub struct ListsPageData {
    pub lists: Vec<ContactList>,
    pub tags: Vec<ContactTag>,
}

#[derive(Debug, Serialize)]
pub struct ListDetail {
    pub list: ContactList,
    pub contacts: Paginated<Contact>,
}

pub fn list_lists<R>(repo: &R, user: &AuthenticatedUser) -> ServiceResult<ListsPageData>
where
    R: ContactListReader + ?Sized,
{
    let user_id = owner_id(user)?;
    Ok(ListsPageData {
        lists: repo.list_contact_lists(user_id)?,
        tags: repo.list_tags(user_id)?,
    })
}

pub fn get_list<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
    page: usize,
) -> ServiceResult<ListDetail>
where
    R: ContactListReader + ContactReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let list = repo
        .get_contact_list(ContactListId::new(id)?, user_id)?
        .ok_or(ServiceError::NotFound)?;
    let page = page.max(1);
    let (total, contacts) = repo.list_contacts(
        ContactListQuery::new(user_id)
            .list(list.id)
            .paginate(page, DEFAULT_ITEMS_PER_PAGE),
    )?;

    Ok(ListDetail {
        list,
        contacts: Paginated::from_total(contacts, page, total, DEFAULT_ITEMS_PER_PAGE),
    })
}

pub fn create_list<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: ContactListForm,
) -> ServiceResult<ContactList>
where
    R: ContactListWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let new_list = form.to_new_list(user_id)?;
    repo.create_contact_list(&new_list).map_err(|err| {
        log::error!("Failed to create contact list: {err}");
        err.into()
    })
}

pub fn update_list<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
    form: ContactListForm,
) -> ServiceResult<ContactList>
where
    R: ContactListReader + ContactListWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let list = repo
        .get_contact_list(ContactListId::new(id)?, user_id)?
        .ok_or(ServiceError::NotFound)?;
    let updates = form.to_update()?;
    Ok(repo.update_contact_list(list.id, &updates)?)
}

pub fn delete_list<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<()>
where
    R: ContactListReader + ContactListWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let list = repo
        .get_contact_list(ContactListId::new(id)?, user_id)?
        .ok_or(ServiceError::NotFound)?;
    repo.delete_contact_list(list.id)?;
    Ok(())
}

pub fn create_tag<R>(repo: &R, user: &AuthenticatedUser, form: TagForm) -> ServiceResult<ContactTag>
where
    R: ContactListWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let tag = form.to_new_tag(user_id)?;
    Ok(repo.create_tag(&tag)?)
}

pub fn delete_tag<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<()>
where
    R: ContactListReader + ContactListWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let tag = repo
        .get_tag(TagId::new(id)?, user_id)?
        .ok_or(ServiceError::NotFound)?;
    repo.delete_tag(tag.id)?;
    Ok(())
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use super::*;
    use crate::repository::errors::RepositoryError;
    use crate::repository::mock::MockRepository;
    use crate::services::test_support::client_user;

    #[test]
    fn duplicate_list_name_is_a_conflict() {
        let mut repo = MockRepository::new();
        repo.expect_create_contact_list()
            .returning(|_| Err(RepositoryError::ConstraintViolation("UNIQUE".into())));
        let form = ContactListForm {
            name: "Customers".into(),
            ..ContactListForm::default()
        };

        let result = create_list(&repo, &client_user(), form);

        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[test]
    fn foreign_list_cannot_be_deleted() {
        let mut repo = MockRepository::new();
        repo.expect_get_contact_list().returning(|_, _| Ok(None));
        repo.expect_delete_contact_list().times(0);

        assert!(matches!(
            delete_list(&repo, &client_user(), 8),
            Err(ServiceError::NotFound)
        ));
    }

    #[test]
    fn invalid_tag_color_is_a_form_error() {
        let repo = MockRepository::new();
        let form = TagForm {
            name: "vip".into(),
            color: Some("green".into()),
        };

        assert!(matches!(
            create_tag(&repo, &client_user(), form),
            Err(ServiceError::Form(_))
        ));
    }
}
