mod inspect;
mod lifecycle;
