#![forbid(unsafe_code)]

//! Profile view-model used by the demo scenarios.
//!
//! A [`Person`] has a name, an email, a derived display line and an optional
//! home [`Address`]. [`ProfileForm`] wraps a person together with a save
//! command whose enablement follows the person's name.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use propel_core::Source;
use propel_runtime::{
    AsyncCommand, Link, ObjectConfig, ObjectType, Property, Reactive, ReactiveObject,
};

pub static PERSON: ObjectType = ObjectType::new("Person");
pub static ADDRESS: ObjectType = ObjectType::new("Address");

pub static NAME: Property<String> = Property::new(&PERSON, "name");
pub static EMAIL: Property<String> = Property::new(&PERSON, "email");
pub static DISPLAY: Property<String> = Property::new(&PERSON, "display");
pub static HOME: Property<Link<Address>> = Property::link(&PERSON, "home");

pub static CITY: Property<String> = Property::new(&ADDRESS, "city");

pub struct Person {
    object: ReactiveObject,
}

impl Person {
    pub fn new(config: &ObjectConfig) -> Rc<Self> {
        let object = ReactiveObject::with_config(&PERSON, config);
        object.derive(&DISPLAY, &[NAME.id(), EMAIL.id()], |person| {
            display_line(&person.get(&NAME), &person.get(&EMAIL))
        });
        Rc::new(Self { object })
    }

    pub fn name(&self) -> String {
        self.object.get(&NAME)
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.object.set(&NAME, name.into());
    }

    pub fn email(&self) -> String {
        self.object.get(&EMAIL)
    }

    pub fn set_email(&self, email: impl Into<String>) {
        self.object.set(&EMAIL, email.into());
    }

    pub fn display(&self) -> String {
        self.object.get(&DISPLAY)
    }

    pub fn home(&self) -> Link<Address> {
        self.object.get(&HOME)
    }

    pub fn set_home(&self, home: Option<&Rc<Address>>) {
        self.object.set(&HOME, Link::from(home.cloned()));
    }
}

impl Reactive for Person {
    fn object_type() -> &'static ObjectType {
        &PERSON
    }

    fn reactive(&self) -> &ReactiveObject {
        &self.object
    }
}

pub struct Address {
    object: ReactiveObject,
}

impl Address {
    pub fn new(config: &ObjectConfig, city: impl Into<String>) -> Rc<Self> {
        let address = Rc::new(Self {
            object: ReactiveObject::with_config(&ADDRESS, config),
        });
        address.set_city(city);
        address
    }

    pub fn city(&self) -> String {
        self.object.get(&CITY)
    }

    pub fn set_city(&self, city: impl Into<String>) {
        self.object.set(&CITY, city.into());
    }
}

impl Reactive for Address {
    fn object_type() -> &'static ObjectType {
        &ADDRESS
    }

    fn reactive(&self) -> &ReactiveObject {
        &self.object
    }
}

fn display_line(name: &str, email: &str) -> String {
    match (name.is_empty(), email.is_empty()) {
        (true, _) => String::new(),
        (false, true) => name.to_owned(),
        (false, false) => format!("{name} <{email}>"),
    }
}

/// What the save command persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    pub name: String,
    pub email: String,
    pub city: Option<String>,
}

impl ProfileDraft {
    pub fn capture(person: &Person) -> Self {
        Self {
            name: person.name(),
            email: person.email(),
            city: person.home().get().map(|home| home.city()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("profile backend unavailable")]
pub struct BackendUnavailable;

/// In-memory stand-in for a profile backend.
#[derive(Default)]
pub struct ProfileRepository {
    saved: RefCell<Vec<ProfileDraft>>,
    failures_left: Cell<u32>,
}

impl ProfileRepository {
    /// A repository whose first `n` saves fail.
    pub fn failing(n: u32) -> Rc<Self> {
        let repository = Self::default();
        repository.failures_left.set(n);
        Rc::new(repository)
    }

    pub fn save(&self, draft: ProfileDraft) -> Result<(), BackendUnavailable> {
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            return Err(BackendUnavailable);
        }
        self.saved.borrow_mut().push(draft);
        Ok(())
    }

    pub fn saved(&self) -> Vec<ProfileDraft> {
        self.saved.borrow().clone()
    }
}

pub struct ProfileForm {
    pub person: Rc<Person>,
    pub save: AsyncCommand<(), bool>,
}

impl ProfileForm {
    /// The save command is enabled while the name is non-empty.
    pub fn new(config: &ObjectConfig, repository: Rc<ProfileRepository>) -> Self {
        let person = Person::new(config);
        let target = Rc::downgrade(&person);
        let enabled = person
            .object
            .observe_value(&NAME)
            .map(|name: &String| !name.trim().is_empty());
        let save = AsyncCommand::builder(move |(): ()| {
            let draft = target.upgrade().map(|person| ProfileDraft::capture(&person));
            let repository = Rc::clone(&repository);
            async move {
                match draft {
                    Some(draft) => repository.save(draft).map(|()| true),
                    None => Ok(false),
                }
            }
        })
        .can_execute(enabled)
        .label("save-profile")
        .build();
        person.object.register(save.clone());
        Self { person, save }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn display_follows_name_and_email() {
        let person = Person::new(&ObjectConfig::default());
        assert_eq!(person.display(), "");
        person.set_name("Ada");
        assert_eq!(person.display(), "Ada");
        person.set_email("ada@example.org");
        assert_eq!(person.display(), "Ada <ada@example.org>");
    }

    #[test]
    fn draft_captures_the_linked_city() {
        let config = ObjectConfig::default();
        let person = Person::new(&config);
        person.set_name("Grace");
        assert_eq!(ProfileDraft::capture(&person).city, None);
        let home = Address::new(&config, "Arlington");
        person.set_home(Some(&home));
        assert_eq!(ProfileDraft::capture(&person).city.as_deref(), Some("Arlington"));
    }

    #[test]
    fn save_requires_a_name() {
        let repository = Rc::new(ProfileRepository::default());
        let form = ProfileForm::new(&ObjectConfig::default(), Rc::clone(&repository));
        assert!(!block_on(form.save.invoke(())));
        form.person.set_name("Ada");
        assert!(block_on(form.save.invoke(())));
        assert_eq!(repository.saved().len(), 1);
    }

    #[test]
    fn disposing_the_person_disposes_its_command() {
        let form = ProfileForm::new(&ObjectConfig::default(), Rc::new(ProfileRepository::default()));
        form.person.object.dispose();
        assert!(form.save.is_disposed());
    }

    #[test]
    fn failing_repository_recovers() {
        let repository = ProfileRepository::failing(1);
        let draft = ProfileDraft {
            name: "Ada".into(),
            email: String::new(),
            city: None,
        };
        assert!(repository.save(draft.clone()).is_err());
        assert!(repository.save(draft).is_ok());
        assert_eq!(repository.saved().len(), 1);
    }
}
